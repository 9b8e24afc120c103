//! Wire formats
//!
//! Binary frames carry control values, JSON text carries heartbeats and, in
//! textual mode, control snapshots. [`decode_inbound`] classifies whatever the
//! consumer sends back.

pub mod binary;
pub mod encoder;
pub mod text;

use crate::error::CodecError;
use serde::{Deserialize, Serialize};

pub use binary::{ControlUpdate, DecodedFrame};
pub use encoder::FrameEncoder;
pub use text::{ControlsPayload, WireMessage};

/// One websocket data frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encoding used for control updates
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    #[default]
    Binary,
    Json,
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(WireMessage),
    Controls(DecodedFrame),
}

pub fn decode_inbound(frame: &Frame) -> Result<Inbound, CodecError> {
    match frame {
        Frame::Text(text) => text::decode_text(text).map(Inbound::Message),
        Frame::Binary(bytes) => binary::decode(bytes).map(Inbound::Controls),
    }
}
