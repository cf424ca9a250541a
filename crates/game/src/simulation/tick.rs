use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often the arena simulates and how often snapshots go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickRates {
    #[serde(with = "millis")]
    pub simulation: Duration,
    #[serde(with = "millis")]
    pub network: Duration,
}

impl Default for TickRates {
    fn default() -> Self {
        Self {
            simulation: Duration::from_millis(32),
            network: Duration::from_millis(48),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Fixed-step accumulator. Every owed tick is run; the backlog is never
/// clamped, so game time stays exact across stalls.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    pub fn new(step: Duration) -> Self {
        assert!(!step.is_zero(), "tick length must be non-zero");
        Self {
            step,
            accumulator: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn dt_secs(&self) -> f32 {
        self.step.as_secs_f32()
    }

    pub fn accumulate(&mut self, elapsed: Duration) {
        self.accumulator += elapsed;
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.step {
            self.accumulator -= self.step;
            true
        } else {
            false
        }
    }

    pub fn residual(&self) -> Duration {
        self.accumulator
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}

/// Snapshot timer: fires at most once per frame however much time passed,
/// discarding the extra whole ticks.
#[derive(Debug, Clone)]
pub struct NetTimer {
    timestep: FixedTimestep,
}

impl NetTimer {
    pub fn new(step: Duration) -> Self {
        Self {
            timestep: FixedTimestep::new(step),
        }
    }

    pub fn advance(&mut self, elapsed: Duration) -> bool {
        self.timestep.accumulate(elapsed);
        let fired = self.timestep.consume_tick();
        while self.timestep.consume_tick() {}
        fired
    }

    pub fn residual(&self) -> Duration {
        self.timestep.residual()
    }
}
