//! Outbound message scheduling
//!
//! Rate limiting, coalescing and offline queueing of control updates.

pub mod queue;
#[allow(clippy::module_inception)]
pub mod scheduler;
pub mod throttle;

use crate::codec::ControlUpdate;

pub use queue::{EnqueueOutcome, OutboundQueue, DEFAULT_QUEUE_CAPACITY};
pub use scheduler::{FrameSink, MessageScheduler, SchedulerStats, SubmitOutcome};
pub use throttle::{ThrottleGate, DEFAULT_THROTTLE_INTERVAL};

/// A control update waiting to be sent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutboundMessage {
    pub control_id: u16,
    pub value: f32,
    pub priority: bool,
}

impl OutboundMessage {
    pub fn normal(control_id: u16, value: f32) -> Self {
        Self {
            control_id,
            value,
            priority: false,
        }
    }

    pub fn priority(control_id: u16, value: f32) -> Self {
        Self {
            control_id,
            value,
            priority: true,
        }
    }

    pub fn update(&self) -> ControlUpdate {
        ControlUpdate::new(self.control_id, self.value)
    }
}

/// How a submission passes the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Bypass the throttle and flush ahead of normal messages
    pub priority: bool,
    /// Coalesce with other updates of the same control
    pub throttle: bool,
}

impl SubmitOptions {
    pub fn priority() -> Self {
        Self {
            priority: true,
            throttle: true,
        }
    }

    pub fn unthrottled() -> Self {
        Self {
            priority: false,
            throttle: false,
        }
    }
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            priority: false,
            throttle: true,
        }
    }
}
