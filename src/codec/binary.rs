//! Binary control frames
//!
//! All multi-byte fields are little-endian.
//!
//! ```text
//! single: [0x01][control_id: u16][value: f32]                  7 bytes
//! batch:  [0x02][count: u8]([control_id: u16][value: f32])*   2 + 6 * count bytes
//! ```

use crate::error::CodecError;

pub const SINGLE_FRAME_TYPE: u8 = 1;
pub const BATCH_FRAME_TYPE: u8 = 2;
pub const SINGLE_FRAME_LEN: usize = 7;
pub const BATCH_HEADER_LEN: usize = 2;
pub const BATCH_ENTRY_LEN: usize = 6;
pub const MAX_BATCH_ENTRIES: usize = u8::MAX as usize;

/// One control value on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlUpdate {
    pub control_id: u16,
    pub value: f32,
}

impl ControlUpdate {
    pub fn new(control_id: u16, value: f32) -> Self {
        Self { control_id, value }
    }

    fn write_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.control_id.to_le_bytes());
        buf.extend_from_slice(&self.value.to_le_bytes());
    }

    fn read_from(entry: &[u8]) -> Self {
        let control_id = u16::from_le_bytes([entry[0], entry[1]]);
        let value = f32::from_le_bytes([entry[2], entry[3], entry[4], entry[5]]);
        Self { control_id, value }
    }
}

/// Result of decoding a binary frame
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    Single(ControlUpdate),
    Batch(Vec<ControlUpdate>),
}

impl DecodedFrame {
    pub fn into_updates(self) -> Vec<ControlUpdate> {
        match self {
            DecodedFrame::Single(update) => vec![update],
            DecodedFrame::Batch(updates) => updates,
        }
    }
}

pub fn encode_single(update: ControlUpdate) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SINGLE_FRAME_LEN);
    buf.push(SINGLE_FRAME_TYPE);
    update.write_into(&mut buf);
    buf
}

/// Encodes up to 255 updates into one batch frame
///
/// # Errors
///
/// * [`CodecError::BatchTooLarge`] - more than 255 updates; callers split with
///   `chunks(MAX_BATCH_ENTRIES)`
pub fn encode_batch(updates: &[ControlUpdate]) -> Result<Vec<u8>, CodecError> {
    if updates.len() > MAX_BATCH_ENTRIES {
        return Err(CodecError::BatchTooLarge(updates.len()));
    }
    let mut buf = Vec::with_capacity(BATCH_HEADER_LEN + updates.len() * BATCH_ENTRY_LEN);
    buf.push(BATCH_FRAME_TYPE);
    buf.push(updates.len() as u8);
    for update in updates {
        update.write_into(&mut buf);
    }
    Ok(buf)
}

/// Decodes a single or batch frame
///
/// # Errors
///
/// * [`CodecError::MalformedFrame`] - empty input, unknown type byte or a length
///   that does not match the declared layout
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame, CodecError> {
    let (&frame_type, body) = bytes
        .split_first()
        .ok_or_else(|| CodecError::MalformedFrame("empty frame".to_string()))?;

    match frame_type {
        SINGLE_FRAME_TYPE => {
            if bytes.len() != SINGLE_FRAME_LEN {
                return Err(CodecError::MalformedFrame(format!(
                    "single frame must be {} bytes, got {}",
                    SINGLE_FRAME_LEN,
                    bytes.len()
                )));
            }
            Ok(DecodedFrame::Single(ControlUpdate::read_from(body)))
        }
        BATCH_FRAME_TYPE => {
            let (&count, entries) = body
                .split_first()
                .ok_or_else(|| CodecError::MalformedFrame("batch frame without count".to_string()))?;
            let expected = count as usize * BATCH_ENTRY_LEN;
            if entries.len() != expected {
                return Err(CodecError::MalformedFrame(format!(
                    "batch of {} entries needs {} bytes, got {}",
                    count,
                    expected,
                    entries.len()
                )));
            }
            Ok(DecodedFrame::Batch(
                entries
                    .chunks_exact(BATCH_ENTRY_LEN)
                    .map(ControlUpdate::read_from)
                    .collect(),
            ))
        }
        other => Err(CodecError::MalformedFrame(format!(
            "unknown frame type {}",
            other
        ))),
    }
}
