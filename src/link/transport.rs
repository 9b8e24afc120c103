//! Transport abstraction
//!
//! A transport opens one socket at a time and reports what happens to it as
//! [`TransportEvent`]s on a channel handed over at construction. Every event
//! carries the generation passed to [`Transport::open`]; the connection manager
//! drops events whose generation is no longer current.

use crate::codec::Frame;
use crate::error::TransportError;

/// Websocket close code for a normal, intentional close
pub const CLOSE_NORMAL: u16 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened {
        generation: u64,
    },
    Message {
        generation: u64,
        frame: Frame,
    },
    /// Socket closed; `clean` only for a close handshake with the normal code
    Closed {
        generation: u64,
        clean: bool,
    },
    /// Socket fault, normally followed by `Closed`
    Error {
        generation: u64,
        reason: String,
    },
}

impl TransportEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TransportEvent::Opened { generation }
            | TransportEvent::Message { generation, .. }
            | TransportEvent::Closed { generation, .. }
            | TransportEvent::Error { generation, .. } => *generation,
        }
    }
}

pub trait Transport: Send {
    /// Starts opening a socket; completion is reported as `Opened` or `Closed`
    ///
    /// # Errors
    ///
    /// * [`TransportError::InvalidAddress`] - address cannot be used at all
    /// * [`TransportError::ConnectionRefused`] - open failed synchronously
    fn open(&mut self, address: &str, generation: u64) -> Result<(), TransportError>;

    fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Closes the current socket, if any. No events of the closed generation are
    /// expected to matter afterwards.
    fn close(&mut self, code: u16, reason: &str);
}
