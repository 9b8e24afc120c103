//! Control link facade
//!
//! Ties shaping, scheduling and the connection manager together behind the small
//! surface the UI side needs: connect, disconnect, submit a control, read
//! `{connected, latency_ms}`.
//!
//! [`ControlLink`] is synchronous and single-owner. Something has to feed it
//! transport events and call [`ControlLink::poll`] when
//! [`ControlLink::next_deadline`] passes; [`crate::link::LinkHandle`] does that on
//! a tokio task, tests do it by hand with a [`crate::link::ManualClock`].

use super::clock::{Clock, SystemClock};
use super::manager::{ConnectionManager, LinkEvent};
use super::state::{LinkStats, LinkStatus};
use super::transport::{Transport, TransportEvent};
use crate::codec::{ControlUpdate, FrameEncoder};
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::scheduler::{FrameSink, MessageScheduler, SubmitOptions, SubmitOutcome};
use crate::shaping::{shape, shape_stick, AxisConfig, StickConfig};
use std::time::Duration;
use tracing::debug;

pub struct ControlLink<T: Transport, C: Clock = SystemClock> {
    manager: ConnectionManager<T>,
    scheduler: MessageScheduler,
    clock: C,
}

impl<T: Transport> ControlLink<T, SystemClock> {
    pub fn new(transport: T, config: &LinkConfig, encoder: FrameEncoder) -> Self {
        Self::with_clock(transport, config, encoder, SystemClock::new())
    }
}

impl<T: Transport, C: Clock> ControlLink<T, C> {
    pub fn with_clock(transport: T, config: &LinkConfig, encoder: FrameEncoder, clock: C) -> Self {
        Self {
            manager: ConnectionManager::new(transport, config),
            scheduler: MessageScheduler::new(
                config.throttle_interval(),
                config.queue_capacity,
                encoder,
            ),
            clock,
        }
    }

    /// Opens a session to `url`, replacing any existing one
    ///
    /// Messages queued while offline survive and are flushed once the new
    /// session opens.
    pub fn connect(&mut self, url: &str) -> Result<(), LinkError> {
        let now = self.clock.now();
        self.manager.connect(url, now)?;
        Ok(())
    }

    /// Closes the session and drops everything not yet sent
    pub fn disconnect(&mut self) {
        self.manager.disconnect();
        self.scheduler.reset();
    }

    /// Shapes `raw` with `config` and submits it throttled
    pub fn submit_control(
        &mut self,
        control_id: u16,
        raw: f32,
        config: &AxisConfig,
    ) -> Result<SubmitOutcome, LinkError> {
        self.submit_control_with(control_id, raw, config, SubmitOptions::default())
    }

    pub fn submit_control_with(
        &mut self,
        control_id: u16,
        raw: f32,
        config: &AxisConfig,
        options: SubmitOptions,
    ) -> Result<SubmitOutcome, LinkError> {
        let value = shape(raw, config);
        self.submit_value(control_id, value, options)
    }

    /// Gates and shapes a stick, then submits both axes
    pub fn submit_stick(
        &mut self,
        x_id: u16,
        y_id: u16,
        x: f32,
        y: f32,
        config: &StickConfig,
    ) -> Result<(), LinkError> {
        let (x, y) = shape_stick(x, y, config);
        self.submit_value(x_id, x, SubmitOptions::default())?;
        self.submit_value(y_id, y, SubmitOptions::default())?;
        Ok(())
    }

    /// Submits an already final value (buttons, gears, pre-shaped axes)
    ///
    /// # Errors
    ///
    /// * [`LinkError::QueueOverflow`] - link down and queue full of priority messages
    /// * [`LinkError::UnknownControl`] - textual mode and the control has no binding
    pub fn submit_value(
        &mut self,
        control_id: u16,
        value: f32,
        options: SubmitOptions,
    ) -> Result<SubmitOutcome, LinkError> {
        let now = self.clock.now();
        let update = ControlUpdate::new(control_id, value);
        match self
            .scheduler
            .submit(update, options, now, &mut self.manager)
        {
            SubmitOutcome::Rejected => Err(LinkError::QueueOverflow),
            SubmitOutcome::Dropped => Err(LinkError::UnknownControl(control_id)),
            outcome => Ok(outcome),
        }
    }

    /// Applies a transport event; a fresh open flushes the offline queue
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Option<LinkEvent> {
        let now = self.clock.now();
        let link_event = self.manager.handle_event(event, now);
        match link_event {
            Some(LinkEvent::Opened) => {
                let flushed = self.scheduler.flush(now, &mut self.manager);
                debug!("Session open, {} queued messages flushed", flushed);
            }
            Some(_) if !self.manager.is_open() => self.scheduler.park_pending(),
            _ => {}
        }
        link_event
    }

    /// Fires whatever timers are due
    pub fn poll(&mut self) -> Option<LinkEvent> {
        let now = self.clock.now();
        let link_event = self.manager.poll_timers(now);
        if link_event.is_some() && !self.manager.is_open() {
            self.scheduler.park_pending();
        }
        self.scheduler.poll(now, &mut self.manager);
        link_event
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.manager.next_deadline(), self.scheduler.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.manager.status()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.status().connected
    }

    pub fn latency_ms(&self) -> Option<u32> {
        self.manager.latency_ms()
    }

    pub fn stats(&self) -> LinkStats {
        let scheduler = self.scheduler.stats();
        let connection = self.manager.stats();
        LinkStats {
            frames_sent: scheduler.frames_sent,
            frames_received: connection.frames_received,
            malformed_frames: connection.malformed_frames,
            messages_coalesced: scheduler.messages_coalesced,
            queue_evictions: scheduler.queue_evictions,
            queue_rejections: scheduler.queue_rejections,
            messages_dropped: scheduler.messages_dropped,
            queued: self.scheduler.queue().len(),
            reconnect_attempts_total: connection.reconnect_attempts_total,
            average_latency_ms: self.manager.latency().average_ms(),
            last_activity: connection.last_activity,
        }
    }

    pub fn manager(&self) -> &ConnectionManager<T> {
        &self.manager
    }

    pub fn scheduler(&self) -> &MessageScheduler {
        &self.scheduler
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.manager.transport_mut()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
