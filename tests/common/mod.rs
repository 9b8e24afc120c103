//! Shared fixtures for the integration tests

#![allow(dead_code)]

use opencontroller_link::codec::binary::{decode, DecodedFrame};
use opencontroller_link::codec::text::decode_text;
use opencontroller_link::codec::{ControlUpdate, Frame, FrameEncoder, WireMessage};
use opencontroller_link::config::LinkConfig;
use opencontroller_link::error::TransportError;
use opencontroller_link::link::{ControlLink, ManualClock, Transport, TransportEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const URL: &str = "ws://127.0.0.1:8000/ws";

/// Everything the link asked the transport to do
#[derive(Debug, Default)]
pub struct TransportLog {
    pub opens: Vec<(String, u64)>,
    pub sent: Vec<Frame>,
    pub closes: Vec<(u16, String)>,
    /// Fail every open with `ConnectionRefused`
    pub refuse: bool,
    /// Fail every send with a socket error
    pub fail_sends: bool,
}

/// Transport that records calls instead of touching the network
///
/// With an event sender attached it reports `Opened` for every open, which is
/// what the actor tests need.
#[derive(Clone, Default)]
pub struct MockTransport {
    log: Arc<Mutex<TransportLog>>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn log(&self) -> Arc<Mutex<TransportLog>> {
        self.log.clone()
    }
}

impl Transport for MockTransport {
    fn open(&mut self, address: &str, generation: u64) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        log.opens.push((address.to_string(), generation));
        if log.refuse {
            return Err(TransportError::ConnectionRefused(address.to_string()));
        }
        if let Some(events) = &self.events {
            let _ = events.send(TransportEvent::Opened { generation });
        }
        Ok(())
    }

    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        if log.fail_sends {
            return Err(TransportError::SocketError("broken pipe".to_string()));
        }
        log.sent.push(frame);
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) {
        self.log.lock().closes.push((code, reason.to_string()));
    }
}

pub struct Harness {
    pub link: ControlLink<MockTransport, ManualClock>,
    pub log: Arc<Mutex<TransportLog>>,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(LinkConfig::default(), FrameEncoder::binary())
    }

    pub fn with(config: LinkConfig, encoder: FrameEncoder) -> Self {
        let transport = MockTransport::new();
        let log = transport.log();
        let clock = ManualClock::new();
        let link = ControlLink::with_clock(transport, &config, encoder, clock.clone());
        Self { link, log, clock }
    }

    /// Connects and delivers the `Opened` event of the new session
    pub fn open(&mut self) {
        self.link.connect(URL).unwrap();
        let generation = self.link.manager().generation();
        self.link
            .handle_transport_event(TransportEvent::Opened { generation });
    }

    pub fn generation(&self) -> u64 {
        self.link.manager().generation()
    }

    pub fn deliver(&mut self, frame: Frame) {
        let generation = self.generation();
        self.link
            .handle_transport_event(TransportEvent::Message { generation, frame });
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.log.lock().sent.clone()
    }

    pub fn opens(&self) -> usize {
        self.log.lock().opens.len()
    }
}

/// Control updates carried by the binary frames sent so far
pub fn sent_updates(frames: &[Frame]) -> Vec<ControlUpdate> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            Frame::Binary(bytes) => decode(bytes).ok().map(DecodedFrame::into_updates),
            Frame::Text(_) => None,
        })
        .flatten()
        .collect()
}

/// JSON messages sent so far
pub fn sent_messages(frames: &[Frame]) -> Vec<WireMessage> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            Frame::Text(text) => decode_text(text).ok(),
            Frame::Binary(_) => None,
        })
        .collect()
}
