//! Heartbeat liveness monitor
//!
//! Tracks the most recent pong acknowledgement and reports a liveness
//! timeout exactly once per silence period. The session loop sends a
//! ping on every interval tick and polls the monitor afterwards.

use std::time::{Duration, Instant};

pub struct Heartbeat {
    interval: Duration,
    timeout: Duration,
    last_ack: Instant,
    expired: bool,
}

impl Heartbeat {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            last_ack: Instant::now(),
            expired: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a pong acknowledgement.
    pub fn on_ack(&mut self, now: Instant) {
        self.last_ack = now;
        self.expired = false;
    }

    /// Returns `true` exactly once when the silence since the last
    /// acknowledgement exceeds the timeout window.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.expired {
            return false;
        }
        if now.duration_since(self.last_ack) > self.timeout {
            self.expired = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> (Heartbeat, Instant) {
        let heartbeat = Heartbeat::new(Duration::from_millis(3000), Duration::from_millis(10_000));
        let start = heartbeat.last_ack;
        (heartbeat, start)
    }

    #[test]
    fn silence_past_timeout_fires_once() {
        let (mut heartbeat, start) = monitor();
        assert!(!heartbeat.poll(start + Duration::from_millis(9_999)));
        assert!(heartbeat.poll(start + Duration::from_millis(10_001)));
        // Subsequent polls stay quiet until an ack resets the window.
        assert!(!heartbeat.poll(start + Duration::from_millis(13_001)));
        assert!(!heartbeat.poll(start + Duration::from_millis(60_000)));
    }

    #[test]
    fn ack_resets_the_window() {
        let (mut heartbeat, start) = monitor();
        heartbeat.on_ack(start + Duration::from_millis(9_000));
        assert!(!heartbeat.poll(start + Duration::from_millis(12_000)));
        assert!(heartbeat.poll(start + Duration::from_millis(19_001)));
    }

    #[test]
    fn ack_after_expiry_rearms() {
        let (mut heartbeat, start) = monitor();
        assert!(heartbeat.poll(start + Duration::from_millis(20_000)));
        heartbeat.on_ack(start + Duration::from_millis(21_000));
        assert!(heartbeat.poll(start + Duration::from_millis(32_000)));
    }
}
