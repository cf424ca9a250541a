use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Artificial loss and latency applied to outgoing datagrams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

#[derive(Debug)]
struct DelayedDatagram {
    release_time: Instant,
    order: u64,
    bytes: Vec<u8>,
    addr: SocketAddr,
}

impl PartialEq for DelayedDatagram {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedDatagram {}

impl PartialOrd for DelayedDatagram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedDatagram {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_time
            .cmp(&self.release_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug)]
pub struct LinkSimulator {
    config: LinkSimulation,
    rng: StdRng,
    queue: BinaryHeap<DelayedDatagram>,
    next_order: u64,
    dropped: u64,
}

impl LinkSimulator {
    pub fn new(config: LinkSimulation, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            queue: BinaryHeap::new(),
            next_order: 0,
            dropped: 0,
        }
    }

    pub fn config(&self) -> &LinkSimulation {
        &self.config
    }

    pub fn set_config(&mut self, config: LinkSimulation) {
        self.config = config;
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn should_drop(&mut self) -> bool {
        if !self.config.enabled || self.config.loss_percent <= 0.0 {
            return false;
        }
        self.rng.gen_range(0.0..100.0) < self.config.loss_percent
    }

    fn delay(&mut self) -> Duration {
        if !self.config.enabled || self.config.max_latency_ms == 0 {
            return Duration::ZERO;
        }
        let min = self.config.min_latency_ms.min(self.config.max_latency_ms);
        let base = self.rng.gen_range(min..=self.config.max_latency_ms);
        let jitter = if self.config.jitter_ms > 0 {
            self.rng.gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(u64::from(base + jitter))
    }

    /// Queues a datagram, or silently loses it.
    pub fn enqueue(&mut self, bytes: Vec<u8>, addr: SocketAddr, now: Instant) {
        if self.should_drop() {
            self.dropped += 1;
            return;
        }

        let release_time = now + self.delay();
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(DelayedDatagram {
            release_time,
            order,
            bytes,
            addr,
        });
    }

    /// Datagrams whose delay has elapsed, in release order.
    pub fn take_due(&mut self, now: Instant) -> Vec<(Vec<u8>, SocketAddr)> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|d| d.release_time <= now) {
            if let Some(delayed) = self.queue.pop() {
                due.push((delayed.bytes, delayed.addr));
            }
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn test_disabled_passes_everything_through() {
        let mut sim = LinkSimulator::new(LinkSimulation::default(), 1);
        let now = Instant::now();
        sim.enqueue(vec![1], addr(), now);
        sim.enqueue(vec![2], addr(), now);

        let due = sim.take_due(now);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].0, vec![1]);
        assert_eq!(due[1].0, vec![2]);
    }

    #[test]
    fn test_total_loss() {
        let config = LinkSimulation {
            enabled: true,
            loss_percent: 100.0,
            ..Default::default()
        };
        let mut sim = LinkSimulator::new(config, 7);
        let now = Instant::now();
        for i in 0..10 {
            sim.enqueue(vec![i], addr(), now);
        }
        assert_eq!(sim.dropped(), 10);
        assert_eq!(sim.pending(), 0);
    }

    #[test]
    fn test_latency_holds_datagrams() {
        let config = LinkSimulation {
            enabled: true,
            min_latency_ms: 50,
            max_latency_ms: 50,
            ..Default::default()
        };
        let mut sim = LinkSimulator::new(config, 3);
        let now = Instant::now();
        sim.enqueue(vec![1], addr(), now);

        assert!(sim.take_due(now).is_empty());
        assert_eq!(sim.take_due(now + Duration::from_millis(50)).len(), 1);
    }
}
