//! Message scheduler
//!
//! Decides when each control update leaves the process:
//!
//! ```text
//! submit ──► link down? ─────────────────────────────► OutboundQueue ──► flush on open
//!              │ no
//!              ├─ priority / unthrottled ──► send now
//!              └─ throttled ──► pending (latest per id) ──► release timer ──► send
//! ```
//!
//! The scheduler owns no socket and no timer task. It is driven by its owner
//! through [`MessageScheduler::poll`] with an explicit `now`, and sends through a
//! [`FrameSink`].

use super::queue::{EnqueueOutcome, OutboundQueue};
use super::throttle::ThrottleGate;
use super::{OutboundMessage, SubmitOptions};
use crate::codec::binary::MAX_BATCH_ENTRIES;
use crate::codec::{ControlUpdate, Frame, FrameEncoder};
use crate::error::TransportError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the scheduler writes frames
pub trait FrameSink {
    fn is_open(&self) -> bool;
    fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError>;
}

/// Result of a single submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent,
    /// Waiting for the throttle release, possibly merged with an earlier value
    Pending,
    Queued,
    /// Queued after evicting the oldest normal message
    Evicted,
    /// Queue full of priority messages, message dropped
    Rejected,
    /// Could not be encoded (no binding in textual mode)
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_sent: u64,
    pub messages_coalesced: u64,
    pub queue_evictions: u64,
    pub queue_rejections: u64,
    pub messages_dropped: u64,
}

#[derive(Debug)]
pub struct MessageScheduler {
    encoder: FrameEncoder,
    queue: OutboundQueue,
    gate: ThrottleGate,
    pending: Vec<ControlUpdate>,
    release_at: Option<Duration>,
    stats: SchedulerStats,
}

impl MessageScheduler {
    pub fn new(throttle_interval: Duration, queue_capacity: usize, encoder: FrameEncoder) -> Self {
        Self {
            encoder,
            queue: OutboundQueue::new(queue_capacity),
            gate: ThrottleGate::new(throttle_interval),
            pending: Vec::new(),
            release_at: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Submits one update
    ///
    /// While the sink is closed everything goes to the queue. Otherwise priority
    /// and unthrottled updates are sent right away and throttled ones are
    /// coalesced per control id until the next release.
    pub fn submit(
        &mut self,
        update: ControlUpdate,
        options: SubmitOptions,
        now: Duration,
        sink: &mut dyn FrameSink,
    ) -> SubmitOutcome {
        let message = OutboundMessage {
            control_id: update.control_id,
            value: update.value,
            priority: options.priority,
        };

        if !sink.is_open() {
            // Older pending values must reach the queue ahead of this one
            self.park_pending();
            return self.enqueue(message);
        }

        if options.priority || !options.throttle {
            self.discard_pending(update.control_id);
            return self.send_now(message, now, sink);
        }

        match self
            .pending
            .iter_mut()
            .find(|p| p.control_id == update.control_id)
        {
            Some(existing) => {
                existing.value = update.value;
                self.stats.messages_coalesced += 1;
            }
            None => self.pending.push(update),
        }

        if self.release_at.is_none() {
            let delay = self.gate.delay_at(now);
            debug!("Throttle release armed in {:?}", delay);
            self.release_at = Some(now + delay);
        }

        SubmitOutcome::Pending
    }

    /// Deadline of the throttle release, if one is armed
    pub fn next_deadline(&self) -> Option<Duration> {
        self.release_at
    }

    /// Fires the throttle release when due
    ///
    /// Returns the number of frames written. Pending updates go to the queue when
    /// the sink closed in the meantime.
    pub fn poll(&mut self, now: Duration, sink: &mut dyn FrameSink) -> usize {
        match self.release_at {
            Some(at) if now >= at => {}
            _ => return 0,
        }
        self.release_at = None;

        if !sink.is_open() {
            self.park_pending();
            return 0;
        }

        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return 0;
        }

        let frames = match self.encoder.encode_many(&pending) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Dropping {} pending updates: {}", pending.len(), e);
                self.stats.messages_dropped += pending.len() as u64;
                return 0;
            }
        };

        let mut sent = 0;
        for (index, frame) in frames.into_iter().enumerate() {
            if let Err(e) = sink.send_frame(frame) {
                warn!("Throttled send failed, queueing remainder: {}", e);
                let delivered = (index * MAX_BATCH_ENTRIES).min(pending.len());
                for update in &pending[delivered..] {
                    self.enqueue(OutboundMessage::normal(update.control_id, update.value));
                }
                break;
            }
            sent += 1;
        }

        if sent > 0 {
            self.stats.frames_sent += sent as u64;
            self.gate.mark_sent(now);
        }
        sent
    }

    /// Sends every queued message, priority first, one frame each
    ///
    /// Stops at the first failed send and keeps the rest queued in order.
    pub fn flush(&mut self, now: Duration, sink: &mut dyn FrameSink) -> usize {
        if self.queue.is_empty() {
            return 0;
        }

        let mut sent = 0;
        while sink.is_open() {
            let Some(message) = self.queue.pop_next() else {
                break;
            };
            let frame = match self.encoder.encode_one(message.update()) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Dropping queued message: {}", e);
                    self.stats.messages_dropped += 1;
                    continue;
                }
            };
            if let Err(e) = sink.send_frame(frame) {
                warn!("Flush interrupted, {} messages stay queued: {}", self.queue.len() + 1, e);
                self.queue.restore_front(message);
                break;
            }
            sent += 1;
        }

        if sent > 0 {
            info!("Flushed {} queued messages", sent);
            self.stats.frames_sent += sent as u64;
            self.gate.mark_sent(now);
        }
        sent
    }

    /// Moves pending updates to the queue and disarms the release
    ///
    /// Called when the link goes down so that nothing submitted afterwards can
    /// be overtaken by an older value on reconnect.
    pub fn park_pending(&mut self) {
        self.release_at = None;
        if self.pending.is_empty() {
            return;
        }
        debug!("Link down, queueing {} pending updates", self.pending.len());
        for update in std::mem::take(&mut self.pending) {
            self.enqueue(OutboundMessage::normal(update.control_id, update.value));
        }
    }

    /// Drops pending updates, the release timer and the queue
    pub fn reset(&mut self) {
        debug!(
            "Resetting scheduler ({} pending, {} queued)",
            self.pending.len(),
            self.queue.len()
        );
        self.pending.clear();
        self.release_at = None;
        self.queue.clear();
        self.gate.reset();
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn send_now(
        &mut self,
        message: OutboundMessage,
        now: Duration,
        sink: &mut dyn FrameSink,
    ) -> SubmitOutcome {
        let frame = match self.encoder.encode_one(message.update()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping message: {}", e);
                self.stats.messages_dropped += 1;
                return SubmitOutcome::Dropped;
            }
        };

        match sink.send_frame(frame) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                self.gate.mark_sent(now);
                SubmitOutcome::Sent
            }
            Err(e) => {
                warn!("Immediate send failed, queueing: {}", e);
                self.enqueue(message)
            }
        }
    }

    /// Forgets the pending value of `control_id`, superseded by a newer one
    fn discard_pending(&mut self, control_id: u16) {
        let before = self.pending.len();
        self.pending.retain(|p| p.control_id != control_id);
        if self.pending.len() < before {
            self.stats.messages_coalesced += 1;
            if self.pending.is_empty() {
                self.release_at = None;
            }
        }
    }

    fn enqueue(&mut self, message: OutboundMessage) -> SubmitOutcome {
        match self.queue.push(message) {
            EnqueueOutcome::Queued => SubmitOutcome::Queued,
            EnqueueOutcome::Evicted(oldest) => {
                self.stats.queue_evictions += 1;
                debug!("Queue full, evicted update for control {}", oldest.control_id);
                SubmitOutcome::Evicted
            }
            EnqueueOutcome::Rejected(rejected) => {
                self.stats.queue_rejections += 1;
                warn!(
                    "Queue full of priority messages, dropped update for control {}",
                    rejected.control_id
                );
                SubmitOutcome::Rejected
            }
        }
    }
}
