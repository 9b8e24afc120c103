//! Input shaping
//!
//! Turns raw widget values into the values sent to the device: response curves,
//! deadzone and range handling per axis, and the gate for two-axis sticks. All
//! functions here are pure and never fail on input; configuration errors are
//! caught when an [`AxisConfig`] is built.

pub mod curve;
pub mod gate;
pub mod shaper;

pub use curve::{apply_curve, CurvePoint, CurveSpec};
pub use gate::{apply_gate, shape_stick, GateConfig, GateKind, StickConfig};
pub use shaper::{shape, AxisConfig, AxisMode, AxisSettings};
