//! Error types for the control link
//!
//! Each concern carries its own `thiserror` enum. [`LinkError`] aggregates them for
//! the facade and the actor handle. Transport faults are normally absorbed into
//! connection state and only surface here when a caller asks for something that
//! cannot be done (bad address, closed command channel, ...).

use thiserror::Error;

/// Wire encoding and decoding failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Inbound frame with an unknown type byte, wrong length or unparsable text
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A batch frame can carry at most 255 entries
    #[error("Batch too large: {0} entries (max 255)")]
    BatchTooLarge(usize),

    /// Textual mode needs a binding to name the axis or button
    #[error("No binding for control {0}")]
    UnboundControl(u16),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Invalid shaping parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapingError {
    /// Curve parameters outside their domain (amount <= 0, unsorted points, ...)
    #[error("Invalid curve spec: {0}")]
    InvalidCurveSpec(String),

    /// Deadzone or range outside the accepted interval
    #[error("Invalid axis config: {0}")]
    InvalidAxisConfig(String),
}

/// Socket level failures reported by a [`crate::link::Transport`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Socket error: {0}")]
    SocketError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Send attempted without an open socket
    #[error("Transport not open")]
    NotOpen,
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available")]
    NoConfigDir,
}

/// Umbrella error of the control link
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Shaping error: {0}")]
    Shaping(#[from] ShapingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The outbound queue was full of priority entries
    #[error("Outbound queue overflow")]
    QueueOverflow,

    /// Reconnection gave up after the configured number of attempts
    #[error("Reconnection exhausted after {0} attempts")]
    ReconnectExhausted(u32),

    #[error("Unknown control: {0}")]
    UnknownControl(u16),

    /// Command or status channel to the link task closed or full
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Thread error: {0}")]
    ThreadError(String),
}
