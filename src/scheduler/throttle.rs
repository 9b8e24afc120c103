//! Throttle gate
//!
//! Tracks the last send instant and tells the scheduler how long to wait before
//! the next throttled release. Time is passed in explicitly as an offset from the
//! link clock's origin.

use std::time::Duration;

pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct ThrottleGate {
    interval: Duration,
    last_send_at: Option<Duration>,
}

impl ThrottleGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_send_at: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_send_at(&self) -> Option<Duration> {
        self.last_send_at
    }

    /// `max(0, interval - elapsed_since_last_send)`
    pub fn delay_at(&self, now: Duration) -> Duration {
        match self.last_send_at {
            Some(last) => self.interval.saturating_sub(now.saturating_sub(last)),
            None => Duration::ZERO,
        }
    }

    pub fn mark_sent(&mut self, now: Duration) {
        self.last_send_at = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_send_at = None;
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_release_is_immediate() {
        let gate = ThrottleGate::default();
        assert_eq!(gate.delay_at(Duration::from_millis(500)), Duration::ZERO);
    }

    #[test]
    fn test_delay_counts_down_from_last_send() {
        let mut gate = ThrottleGate::default();
        gate.mark_sent(Duration::from_millis(100));
        assert_eq!(gate.delay_at(Duration::from_millis(100)), Duration::from_millis(16));
        assert_eq!(gate.delay_at(Duration::from_millis(110)), Duration::from_millis(6));
        assert_eq!(gate.delay_at(Duration::from_millis(140)), Duration::ZERO);
    }
}
