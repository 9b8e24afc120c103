//! Outbound frame encoding for both protocol modes

use super::binary::{self, ControlUpdate, MAX_BATCH_ENTRIES};
use super::text::{encode_text, AxisValue, ControlsPayload, WireMessage};
use super::{Frame, ProtocolMode};
use crate::error::CodecError;
use crate::mapping::{Binding, ControlBindings};

/// Turns control updates into frames
///
/// Binary mode is stateless. Textual mode keeps the last value of every bound
/// control and emits the whole snapshot on each encode, which is what a
/// consumer of the `controls` message expects.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    mode: ProtocolMode,
    bindings: ControlBindings,
    snapshot: ControlsPayload,
}

impl FrameEncoder {
    pub fn binary() -> Self {
        Self {
            mode: ProtocolMode::Binary,
            bindings: ControlBindings::default(),
            snapshot: ControlsPayload::default(),
        }
    }

    pub fn json(bindings: ControlBindings, layout_id: Option<String>) -> Self {
        let mut snapshot = ControlsPayload::default();
        snapshot.meta.layout_id = layout_id;
        Self {
            mode: ProtocolMode::Json,
            bindings,
            snapshot,
        }
    }

    pub fn for_mode(
        mode: ProtocolMode,
        bindings: ControlBindings,
        layout_id: Option<String>,
    ) -> Self {
        match mode {
            ProtocolMode::Binary => Self::binary(),
            ProtocolMode::Json => Self::json(bindings, layout_id),
        }
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// Encodes one update as a single frame
    ///
    /// # Errors
    ///
    /// * [`CodecError::UnboundControl`] - textual mode and no binding for the id
    pub fn encode_one(&mut self, update: ControlUpdate) -> Result<Frame, CodecError> {
        match self.mode {
            ProtocolMode::Binary => Ok(Frame::Binary(binary::encode_single(update))),
            ProtocolMode::Json => {
                self.apply(update)?;
                self.snapshot_frame()
            }
        }
    }

    /// Encodes several updates into as few frames as possible
    ///
    /// Binary mode sends a single frame for one update and batch frames of at most
    /// 255 entries otherwise. Textual mode folds everything into one snapshot;
    /// unbound controls are skipped there and reported only if nothing was bound.
    pub fn encode_many(&mut self, updates: &[ControlUpdate]) -> Result<Vec<Frame>, CodecError> {
        match (self.mode, updates) {
            (_, []) => Ok(Vec::new()),
            (ProtocolMode::Binary, [update]) => {
                Ok(vec![Frame::Binary(binary::encode_single(*update))])
            }
            (ProtocolMode::Binary, _) => updates
                .chunks(MAX_BATCH_ENTRIES)
                .map(|chunk| binary::encode_batch(chunk).map(Frame::Binary))
                .collect(),
            (ProtocolMode::Json, _) => {
                let mut applied = 0;
                let mut last_error = None;
                for update in updates {
                    match self.apply(*update) {
                        Ok(()) => applied += 1,
                        Err(e) => last_error = Some(e),
                    }
                }
                match (applied, last_error) {
                    (0, Some(e)) => Err(e),
                    _ => Ok(vec![self.snapshot_frame()?]),
                }
            }
        }
    }

    pub fn snapshot(&self) -> &ControlsPayload {
        &self.snapshot
    }

    fn apply(&mut self, update: ControlUpdate) -> Result<(), CodecError> {
        match self.bindings.get(update.control_id) {
            Some(Binding::Axis { axis, mode }) => {
                self.snapshot.axes.insert(
                    *axis,
                    AxisValue {
                        value: update.value,
                        mode: *mode,
                    },
                );
                Ok(())
            }
            Some(Binding::Button {
                number: Some(number),
            }) => {
                self.snapshot.buttons.insert(*number, update.value);
                Ok(())
            }
            Some(Binding::Button { number: None }) | None => {
                Err(CodecError::UnboundControl(update.control_id))
            }
        }
    }

    fn snapshot_frame(&self) -> Result<Frame, CodecError> {
        let message = WireMessage::Controls {
            data: self.snapshot.clone(),
        };
        Ok(Frame::Text(encode_text(&message)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::binary::{decode, DecodedFrame};
    use crate::codec::text::decode_text;
    use crate::mapping::AxisName;
    use crate::shaping::AxisMode;

    fn bindings() -> ControlBindings {
        [
            (
                1,
                Binding::Axis {
                    axis: AxisName::X,
                    mode: AxisMode::Centered,
                },
            ),
            (2, Binding::Button { number: Some(5) }),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_binary_many_uses_batches() {
        let mut encoder = FrameEncoder::binary();
        let updates: Vec<_> = (0..300u16).map(|i| ControlUpdate::new(i, 0.5)).collect();
        let frames = encoder.encode_many(&updates).unwrap();
        assert_eq!(frames.len(), 2);
        match &frames[1] {
            Frame::Binary(bytes) => match decode(bytes).unwrap() {
                DecodedFrame::Batch(batch) => assert_eq!(batch.len(), 45),
                other => panic!("unexpected frame {:?}", other),
            },
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_binary_single_update_is_single_frame() {
        let mut encoder = FrameEncoder::binary();
        let frames = encoder.encode_many(&[ControlUpdate::new(3, 1.0)]).unwrap();
        assert_eq!(frames, vec![Frame::Binary(binary::encode_single(ControlUpdate::new(3, 1.0)))]);
    }

    #[test]
    fn test_json_snapshot_accumulates() {
        let mut encoder = FrameEncoder::json(bindings(), Some("wheel".to_string()));
        encoder.encode_one(ControlUpdate::new(1, -0.5)).unwrap();
        let frame = encoder.encode_one(ControlUpdate::new(2, 1.0)).unwrap();

        let text = match frame {
            Frame::Text(text) => text,
            other => panic!("unexpected frame {:?}", other),
        };
        match decode_text(&text).unwrap() {
            WireMessage::Controls { data } => {
                assert_eq!(data.axes[&AxisName::X].value, -0.5);
                assert_eq!(data.buttons[&5], 1.0);
                assert_eq!(data.meta.layout_id.as_deref(), Some("wheel"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_json_unbound_control_is_rejected() {
        let mut encoder = FrameEncoder::json(bindings(), None);
        assert_eq!(
            encoder.encode_one(ControlUpdate::new(99, 1.0)),
            Err(CodecError::UnboundControl(99))
        );
        // Mixed batch still produces a snapshot
        let frames = encoder
            .encode_many(&[ControlUpdate::new(99, 1.0), ControlUpdate::new(1, 0.25)])
            .unwrap();
        assert_eq!(frames.len(), 1);
    }
}
