//! JSON messages
//!
//! Heartbeats always travel as text. In textual protocol mode the control state
//! does too, as a full `controls` snapshot:
//!
//! ```json
//! { "type": "controls",
//!   "data": { "axes": { "X": { "value": 0.5, "mode": "centered" } },
//!             "buttons": { "1": 1.0 },
//!             "meta": { "layoutId": "wheel" } } }
//! ```

use crate::error::CodecError;
use crate::mapping::AxisName;
use crate::shaping::AxisMode;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Every JSON message exchanged with the consumer
///
/// Unknown `type` tags decode to [`WireMessage::Unknown`] so newer servers can add
/// message kinds without tearing the link down.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Ping { t: f64 },
    Pong { t: f64 },
    Controls { data: ControlsPayload },
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AxisValue {
    pub value: f32,
    pub mode: AxisMode,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_id: Option<String>,
}

/// Snapshot of every bound control
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ControlsPayload {
    #[serde(default)]
    pub axes: BTreeMap<AxisName, AxisValue>,
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_buttons")]
    pub buttons: BTreeMap<u8, f32>,
    #[serde(default)]
    pub meta: PayloadMeta,
}

/// JSON object keys are strings, and the tagged `WireMessage` hands them over as
/// such, so button numbers are parsed here.
fn deserialize_buttons<'de, D>(deserializer: D) -> Result<BTreeMap<u8, f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, f32>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            key.parse::<u8>()
                .map(|number| (number, value))
                .map_err(|_| de::Error::custom(format!("invalid button number {:?}", key)))
        })
        .collect()
}

pub fn encode_text(message: &WireMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|e| CodecError::Encoding(e.to_string()))
}

pub fn decode_text(text: &str) -> Result<WireMessage, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::MalformedFrame(e.to_string()))
}
