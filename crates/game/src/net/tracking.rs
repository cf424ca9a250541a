use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::protocol::sequence_greater_than;

const ACK_WINDOW: u32 = 32;

/// Whether `sequence` is covered by an `(ack, ack_bitfield)` pair.
pub fn is_acked(sequence: u32, ack: u32, ack_bitfield: u32) -> bool {
    if sequence == ack {
        return true;
    }
    if !sequence_greater_than(ack, sequence) {
        return false;
    }
    let diff = ack.wrapping_sub(sequence);
    diff <= ACK_WINDOW && (ack_bitfield & (1 << (diff - 1))) != 0
}

/// Receive side of the ack scheme: remembers which datagram sequences arrived
/// and summarises them as `(latest, bitfield of the 32 before it)`.
#[derive(Debug)]
pub struct ReceiveWindow {
    latest: u32,
    bitfield: u32,
    recent: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveWindow {
    pub fn new() -> Self {
        Self {
            latest: 0,
            bitfield: 0,
            recent: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Returns `false` for a duplicate.
    pub fn record(&mut self, sequence: u32) -> bool {
        if self.recent.contains(&sequence) {
            return false;
        }

        if self.recent.len() >= self.max_recent {
            self.recent.pop_front();
        }
        self.recent.push_back(sequence);

        if sequence_greater_than(sequence, self.latest) {
            let diff = sequence.wrapping_sub(self.latest);
            self.bitfield = if diff < ACK_WINDOW {
                (self.bitfield << diff) | (1 << (diff - 1))
            } else if diff == ACK_WINDOW {
                1 << (ACK_WINDOW - 1)
            } else {
                0
            };
            self.latest = sequence;
        } else {
            let diff = self.latest.wrapping_sub(sequence);
            if diff > 0 && diff <= ACK_WINDOW {
                self.bitfield |= 1 << (diff - 1);
            }
        }

        true
    }

    pub fn ack_data(&self) -> (u32, u32) {
        (self.latest, self.bitfield)
    }
}

/// Smoothed round-trip estimate.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    srtt_ms: f32,
    rtt_var_ms: f32,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self {
            srtt_ms: 100.0,
            rtt_var_ms: 50.0,
        }
    }
}

impl RttEstimator {
    pub fn sample(&mut self, sent_at: Instant, now: Instant) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let rtt = now.saturating_duration_since(sent_at).as_secs_f32() * 1000.0;
        let diff = (rtt - self.srtt_ms).abs();
        self.rtt_var_ms = (1.0 - BETA) * self.rtt_var_ms + BETA * diff;
        self.srtt_ms = (1.0 - ALPHA) * self.srtt_ms + ALPHA * rtt;
    }

    pub fn srtt_ms(&self) -> f32 {
        self.srtt_ms
    }

    pub fn rtt_var_ms(&self) -> f32 {
        self.rtt_var_ms
    }

    /// Resend timeout: srtt + 4 * rttvar, never below `floor`.
    pub fn resend_timeout(&self, floor: Duration) -> Duration {
        let ms = self.srtt_ms + 4.0 * self.rtt_var_ms;
        Duration::from_secs_f32(ms.max(0.0) / 1000.0).max(floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_window_bitfield() {
        let mut window = ReceiveWindow::new();

        window.record(1);
        window.record(2);
        window.record(3);

        let (ack, bitfield) = window.ack_data();
        assert_eq!(ack, 3);
        assert!(is_acked(1, ack, bitfield));
        assert!(is_acked(2, ack, bitfield));
        assert!(!is_acked(4, ack, bitfield));
    }

    #[test]
    fn test_receive_window_out_of_order() {
        let mut window = ReceiveWindow::new();

        window.record(3);
        window.record(1);
        window.record(2);

        let (ack, bitfield) = window.ack_data();
        assert_eq!(ack, 3);
        assert!(is_acked(1, ack, bitfield));
        assert!(is_acked(2, ack, bitfield));
    }

    #[test]
    fn test_gap_is_not_acked() {
        let mut window = ReceiveWindow::new();

        window.record(1);
        window.record(4);

        let (ack, bitfield) = window.ack_data();
        assert!(is_acked(1, ack, bitfield));
        assert!(!is_acked(2, ack, bitfield));
        assert!(!is_acked(3, ack, bitfield));
    }

    #[test]
    fn test_duplicate_detection() {
        let mut window = ReceiveWindow::new();

        assert!(window.record(1));
        assert!(!window.record(1));
        assert!(window.record(2));
    }

    #[test]
    fn test_rtt_moves_toward_samples() {
        let mut rtt = RttEstimator::default();
        let sent = Instant::now();

        rtt.sample(sent, sent + Duration::from_millis(20));

        assert!(rtt.srtt_ms() < 100.0);
        assert!(rtt.resend_timeout(Duration::from_millis(50)) >= Duration::from_millis(50));
    }
}
