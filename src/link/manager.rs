//! Connection manager
//!
//! Owns the transport and the session: lifecycle state, reconnect backoff,
//! heartbeat pings and the latency window. Sans-IO in the sense that it never
//! sleeps or spawns; timers are deadlines that its owner fires through
//! [`ConnectionManager::poll_timers`].
//!
//! # Session generations
//!
//! Each socket opened gets a fresh generation number. Transport events carry the
//! generation they belong to, and anything from an older session (a late close
//! after `disconnect`, a pong racing a reconnect) is discarded. Timers are
//! cleared whenever the generation changes, so they cannot fire into a newer
//! session either.

use super::latency::{round_trip_ms, LatencyTracker};
use super::state::{ConnectionState, LinkStatus, ReconnectPolicy};
use super::transport::{Transport, TransportEvent, CLOSE_NORMAL};
use crate::codec::text::encode_text;
use crate::codec::{decode_inbound, Frame, Inbound, WireMessage};
use crate::config::LinkConfig;
use crate::error::TransportError;
use crate::scheduler::FrameSink;
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Session level outcome of a transport event or timer
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Opened,
    Closed { clean: bool },
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Reconnection exhausted, state is now `Failed`
    GaveUp { attempts: u32 },
    LatencySample(u32),
    /// Inbound frame that is not part of the heartbeat protocol
    Received(Inbound),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStats {
    pub frames_written: u64,
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub reconnect_attempts_total: u64,
    pub last_activity: Option<DateTime<Local>>,
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    policy: ReconnectPolicy,
    heartbeat_interval: Duration,
    address: Option<String>,
    state: ConnectionState,
    generation: u64,
    reconnect_attempt: u32,
    reconnect_at: Option<Duration>,
    heartbeat_at: Option<Duration>,
    latency: LatencyTracker,
    stats: ConnectionStats,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: &LinkConfig) -> Self {
        Self {
            transport,
            policy: config.reconnect_policy(),
            heartbeat_interval: config.heartbeat_interval(),
            address: None,
            state: ConnectionState::Idle,
            generation: 0,
            reconnect_attempt: 0,
            reconnect_at: None,
            heartbeat_at: None,
            latency: LatencyTracker::new(config.latency_window),
            stats: ConnectionStats::default(),
        }
    }

    /// Opens a session to `address`, tearing down any existing one
    ///
    /// Resets the reconnect attempt counter, so this is also the way out of
    /// `Failed`. Refused or failing opens go through the reconnect path and are
    /// not reported here.
    ///
    /// # Errors
    ///
    /// * [`TransportError::InvalidAddress`] - the transport cannot use `address`;
    ///   the manager stays `Idle`
    pub fn connect(&mut self, address: &str, now: Duration) -> Result<(), TransportError> {
        if self.has_socket() || self.state == ConnectionState::Reconnecting {
            info!("Tearing down existing session before connecting");
            self.teardown();
        }
        self.reconnect_attempt = 0;
        self.address = Some(address.to_string());
        info!("Connecting to {}", address);
        self.open_session(now).map(|_| ())
    }

    /// Closes the session with the normal close code and forgets it
    ///
    /// Synchronous: when this returns no timer is armed and no event of the
    /// closed session will be accepted.
    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Idle {
            info!("Disconnecting ({})", self.state);
        }
        self.teardown();
        self.address = None;
        self.reconnect_attempt = 0;
    }

    /// Applies one transport event
    pub fn handle_event(&mut self, event: TransportEvent, now: Duration) -> Option<LinkEvent> {
        if event.generation() != self.generation {
            debug!(
                "Ignoring event of stale session {} (current {})",
                event.generation(),
                self.generation
            );
            return None;
        }

        match event {
            TransportEvent::Opened { .. } => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring open in state {}", self.state);
                    return None;
                }
                info!("Connection open");
                self.state = ConnectionState::Open;
                self.reconnect_attempt = 0;
                self.latency.clear();
                self.heartbeat_at = Some(now + self.heartbeat_interval);
                Some(LinkEvent::Opened)
            }
            TransportEvent::Message { frame, .. } => {
                if self.state != ConnectionState::Open {
                    debug!("Ignoring frame in state {}", self.state);
                    return None;
                }
                self.handle_frame(frame, now)
            }
            TransportEvent::Error { reason, .. } => {
                warn!("Socket error: {}", reason);
                if self.state == ConnectionState::Open {
                    self.state = ConnectionState::Closing;
                    self.heartbeat_at = None;
                }
                None
            }
            TransportEvent::Closed { clean, .. } => {
                if !self.has_socket() {
                    debug!("Ignoring close in state {}", self.state);
                    return None;
                }
                self.heartbeat_at = None;
                self.latency.clear();
                if clean {
                    info!("Connection closed cleanly");
                    self.state = ConnectionState::Idle;
                    Some(LinkEvent::Closed { clean: true })
                } else {
                    warn!("Connection lost");
                    Some(self.schedule_reconnect(now))
                }
            }
        }
    }

    /// Fires due timers: reconnect attempts and heartbeat pings
    pub fn poll_timers(&mut self, now: Duration) -> Option<LinkEvent> {
        if let Some(at) = self.reconnect_at {
            if now >= at {
                self.reconnect_at = None;
                info!(
                    "Attempting to reconnect ({}/{})",
                    self.reconnect_attempt, self.policy.max_attempts
                );
                return match self.open_session(now) {
                    Ok(event) => event,
                    Err(e) => {
                        error!("Reconnect impossible: {}", e);
                        None
                    }
                };
            }
        }

        if let Some(at) = self.heartbeat_at {
            if now >= at {
                self.send_ping(now);
                self.heartbeat_at = Some(now + self.heartbeat_interval);
            }
        }

        None
    }

    /// Earliest armed timer
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.reconnect_at, self.heartbeat_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn latency_ms(&self) -> Option<u32> {
        self.latency.latest()
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            connected: self.state == ConnectionState::Open,
            latency_ms: self.latency_ms(),
            reconnect_attempt: self.reconnect_attempt,
        }
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn has_socket(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
        )
    }

    fn teardown(&mut self) {
        self.reconnect_at = None;
        self.heartbeat_at = None;
        if self.has_socket() {
            self.transport.close(CLOSE_NORMAL, "Client disconnecting");
        }
        self.generation += 1;
        self.state = ConnectionState::Idle;
        self.latency.clear();
    }

    fn open_session(&mut self, now: Duration) -> Result<Option<LinkEvent>, TransportError> {
        let Some(address) = self.address.clone() else {
            return Ok(None);
        };
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        debug!("Opening session {} to {}", self.generation, address);

        match self.transport.open(&address, self.generation) {
            Ok(()) => Ok(None),
            Err(TransportError::InvalidAddress(reason)) => {
                error!("Invalid address {}: {}", address, reason);
                self.state = ConnectionState::Idle;
                self.address = None;
                Err(TransportError::InvalidAddress(reason))
            }
            Err(e) => {
                warn!("Failed to open connection: {}", e);
                Ok(Some(self.schedule_reconnect(now)))
            }
        }
    }

    fn schedule_reconnect(&mut self, now: Duration) -> LinkEvent {
        if self.reconnect_attempt >= self.policy.max_attempts {
            error!(
                "Max reconnect attempts reached ({}), giving up",
                self.policy.max_attempts
            );
            self.state = ConnectionState::Failed;
            self.reconnect_at = None;
            return LinkEvent::GaveUp {
                attempts: self.reconnect_attempt,
            };
        }

        let delay = self.policy.delay_for(self.reconnect_attempt);
        self.reconnect_attempt += 1;
        self.stats.reconnect_attempts_total += 1;
        self.reconnect_at = Some(now + delay);
        self.state = ConnectionState::Reconnecting;
        info!(
            "Reconnecting in {}ms (attempt {}/{})",
            delay.as_millis(),
            self.reconnect_attempt,
            self.policy.max_attempts
        );
        LinkEvent::ReconnectScheduled {
            attempt: self.reconnect_attempt,
            delay,
        }
    }

    fn handle_frame(&mut self, frame: Frame, now: Duration) -> Option<LinkEvent> {
        let inbound = match decode_inbound(&frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.stats.malformed_frames += 1;
                debug!("Ignoring malformed frame: {}", e);
                return None;
            }
        };
        self.stats.frames_received += 1;
        self.stats.last_activity = Some(Local::now());

        match inbound {
            Inbound::Message(WireMessage::Pong { t }) => {
                let rtt = round_trip_ms(millis(now), t)?;
                self.latency.record(rtt);
                debug!("Round trip {}ms", rtt);
                Some(LinkEvent::LatencySample(rtt))
            }
            Inbound::Message(WireMessage::Ping { t }) => {
                self.send_text(&WireMessage::Pong { t });
                None
            }
            other => Some(LinkEvent::Received(other)),
        }
    }

    fn send_ping(&mut self, now: Duration) {
        self.send_text(&WireMessage::Ping { t: millis(now) });
    }

    fn send_text(&mut self, message: &WireMessage) {
        let text = match encode_text(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {:?}: {}", message, e);
                return;
            }
        };
        if let Err(e) = self.send_frame(Frame::Text(text)) {
            warn!("Failed to send heartbeat: {}", e);
        }
    }
}

impl<T: Transport> FrameSink for ConnectionManager<T> {
    fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.state != ConnectionState::Open {
            return Err(TransportError::NotOpen);
        }
        self.transport.send(frame)?;
        self.stats.frames_written += 1;
        self.stats.last_activity = Some(Local::now());
        Ok(())
    }
}

fn millis(offset: Duration) -> f64 {
    offset.as_secs_f64() * 1000.0
}
