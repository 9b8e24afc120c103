//! WebSocket transport on tokio-tungstenite
//!
//! Each `open` spawns one session task that owns the socket. Outbound frames
//! reach it through an unbounded channel, everything the socket does is reported
//! back as [`TransportEvent`]s tagged with the session generation.

use super::transport::{Transport, TransportEvent};
use crate::codec::Frame;
use crate::error::TransportError;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

/// How long a closing session waits for the peer to answer the close frame
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WsTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    session: Option<JoinHandle<()>>,
    close_timeout: Duration,
}

impl WsTransport {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            outbound: None,
            session: None,
            close_timeout: CLOSE_TIMEOUT,
        }
    }

    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    fn abort_session(&mut self) {
        self.outbound = None;
        if let Some(session) = self.session.take() {
            session.abort();
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, address: &str, generation: u64) -> Result<(), TransportError> {
        validate_address(address)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::SocketError(format!("No tokio runtime: {}", e)))?;

        self.abort_session();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = runtime.spawn(run_session(
            address.to_string(),
            generation,
            self.events.clone(),
            outbound_rx,
            self.close_timeout,
        ));
        self.outbound = Some(outbound_tx);
        self.session = Some(session);
        Ok(())
    }

    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotOpen)?;
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        outbound
            .send(message)
            .map_err(|_| TransportError::SocketError("Session task stopped".to_string()))
    }

    fn close(&mut self, code: u16, reason: &str) {
        if let Some(outbound) = self.outbound.take() {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_string().into(),
            };
            if outbound.send(Message::Close(Some(frame))).is_err() {
                debug!("Session already gone, nothing to close");
            }
        }
        // The session finishes the close handshake on its own and is detached
        self.session = None;
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.abort_session();
    }
}

fn validate_address(address: &str) -> Result<(), TransportError> {
    let host = if let Some(rest) = address.strip_prefix("ws://") {
        rest
    } else if address.starts_with("wss://") {
        return Err(TransportError::InvalidAddress(
            "wss:// needs TLS support, which this build does not include".to_string(),
        ));
    } else {
        return Err(TransportError::InvalidAddress(format!(
            "{} is not a ws:// url",
            address
        )));
    };

    if host.is_empty() || host.starts_with('/') {
        return Err(TransportError::InvalidAddress(format!(
            "{} has no host",
            address
        )));
    }
    Ok(())
}

async fn run_session(
    address: String,
    generation: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    close_timeout: Duration,
) {
    let emit = |event: TransportEvent| {
        if events.send(event).is_err() {
            trace!("Link task gone, dropping transport event");
        }
    };

    let stream = match connect_async(address.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", address, e);
            emit(TransportEvent::Error {
                generation,
                reason: e.to_string(),
            });
            emit(TransportEvent::Closed {
                generation,
                clean: false,
            });
            return;
        }
    };

    debug!("Session {} connected to {}", generation, address);
    emit(TransportEvent::Opened { generation });

    let (mut write, mut read) = stream.split();
    let mut close_deadline: Option<Instant> = None;

    let clean = loop {
        tokio::select! {
            message = outbound.recv(), if close_deadline.is_none() => {
                match message {
                    Some(message) => {
                        if let Err(e) = write.send(message).await {
                            emit(TransportEvent::Error { generation, reason: e.to_string() });
                            break false;
                        }
                    }
                    // Sender dropped, give the peer a bounded time to finish the close
                    None => close_deadline = Some(Instant::now() + close_timeout),
                }
            }

            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        emit(TransportEvent::Message { generation, frame: Frame::Text(text) });
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        emit(TransportEvent::Message { generation, frame: Frame::Binary(bytes) });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Session {} received close: {:?}", generation, frame);
                        break frame.is_some_and(|frame| frame.code == CloseCode::Normal);
                    }
                    // Ping and pong frames are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        emit(TransportEvent::Error { generation, reason: e.to_string() });
                        break false;
                    }
                    None => break false,
                }
            }

            _ = sleep_until(close_deadline), if close_deadline.is_some() => {
                warn!("Session {} peer did not answer the close within {:?}", generation, close_timeout);
                break false;
            }
        }
    };

    emit(TransportEvent::Closed { generation, clean });
    debug!("Session {} ended (clean: {})", generation, clean);
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
