//! Connection states, reconnect policy and the published link status

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_BASE_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_millis(30000);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);

/// Lifecycle of the socket session
///
/// ```text
/// Idle ──connect──► Connecting ──open──► Open ──error──► Closing
///  ▲                   │                  │                 │
///  │                   └──unclean close───┴─────────────────┤
///  │                                                        ▼
///  └──clean close / disconnect──  Reconnecting ◄──backoff── (attempt < max)
///                                     │
///                                     └──attempt >= max──► Failed
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    /// Socket reported an error and is going down
    Closing,
    /// Waiting for the backoff timer
    Reconnecting,
    /// Reconnection gave up; only a fresh connect leaves this state
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Exponential backoff parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis().min(u128::from(u64::MAX)) as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(factor));
        delay.min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_RECONNECT_DELAY,
            max_delay: DEFAULT_MAX_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// What collaborators read about the link
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub connected: bool,
    /// Latest round-trip sample, `None` until the first pong of a session
    pub latency_ms: Option<u32>,
    pub reconnect_attempt: u32,
}

/// Counters for diagnostics
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LinkStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub messages_coalesced: u64,
    pub queue_evictions: u64,
    pub queue_rejections: u64,
    pub messages_dropped: u64,
    pub queued: usize,
    pub reconnect_attempts_total: u64,
    pub average_latency_ms: Option<f32>,
    pub last_activity: Option<DateTime<Local>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7)
            .map(|attempt| policy.delay_for(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(200), Duration::from_millis(30000));
    }
}
