//! Two-axis gate constraint
//!
//! A joystick knob can be dragged past its rim. The gate pulls raw `(x, y)` back
//! onto the allowed area before each axis is shaped on its own.

use super::shaper::{shape, AxisConfig};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    /// Vector length limited to 1
    #[default]
    Circular,
    /// Each axis limited to `[-1, 1]`
    Square,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateConfig {
    #[serde(default)]
    pub kind: GateKind,
}

impl GateConfig {
    pub fn circular() -> Self {
        Self {
            kind: GateKind::Circular,
        }
    }

    pub fn square() -> Self {
        Self {
            kind: GateKind::Square,
        }
    }
}

/// Constrains a raw stick position to the gate
pub fn apply_gate(x: f32, y: f32, gate: &GateConfig) -> (f32, f32) {
    let x = if x.is_nan() { 0.0 } else { x };
    let y = if y.is_nan() { 0.0 } else { y };

    match gate.kind {
        GateKind::Circular => {
            // f64 keeps the norm finite for every finite f32 pair
            let (x, y) = (
                f64::from(x).clamp(-f64::from(f32::MAX), f64::from(f32::MAX)),
                f64::from(y).clamp(-f64::from(f32::MAX), f64::from(f32::MAX)),
            );
            let norm = x.hypot(y);
            if norm > 1.0 {
                // Rounding to f32 can land a hair outside the circle
                let scale = (1.0 - f64::from(f32::EPSILON)) / norm;
                ((x * scale) as f32, (y * scale) as f32)
            } else {
                (x as f32, y as f32)
            }
        }
        GateKind::Square => (x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0)),
    }
}

/// Shaping configuration of a two-axis stick
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StickConfig {
    pub x: AxisConfig,
    pub y: AxisConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

/// Gates the raw position, then shapes each axis independently
pub fn shape_stick(x: f32, y: f32, config: &StickConfig) -> (f32, f32) {
    let (gx, gy) = apply_gate(x, y, &config.gate);
    (shape(gx, &config.x), shape(gy, &config.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_gate_normalizes_outside_unit_circle() {
        let (x, y) = apply_gate(1.0, 1.0, &GateConfig::circular());
        assert!((x.hypot(y) - 1.0).abs() < 1e-6);
        assert!((x - y).abs() < 1e-6);
    }

    #[test]
    fn test_circular_gate_keeps_inside_points() {
        assert_eq!(apply_gate(0.3, -0.4, &GateConfig::circular()), (0.3, -0.4));
    }

    #[test]
    fn test_square_gate_clamps_each_axis() {
        assert_eq!(apply_gate(1.7, -0.2, &GateConfig::square()), (1.0, -0.2));
        assert_eq!(apply_gate(1.0, 1.0, &GateConfig::square()), (1.0, 1.0));
    }

    #[test]
    fn test_gate_handles_infinite_input() {
        let (x, y) = apply_gate(f32::INFINITY, 0.5, &GateConfig::circular());
        assert!(x.hypot(y) <= 1.0);
        assert!((x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gate_handles_huge_input() {
        let (x, y) = apply_gate(3e38, 3e38, &GateConfig::circular());
        assert!(x.hypot(y) <= 1.0, "({}, {}) outside the unit circle", x, y);
        assert!((x - y).abs() < 1e-6);
        assert!(x > 0.7);
    }

    #[test]
    fn test_shape_stick_applies_gate_before_deadzone() {
        let axis = AxisConfig::new(0.1, 1.0, None, crate::shaping::AxisMode::Centered).unwrap();
        let config = StickConfig {
            x: axis.clone(),
            y: axis,
            gate: GateConfig::circular(),
        };
        let (x, y) = shape_stick(2.0, 0.0, &config);
        assert_eq!(x, 1.0);
        assert_eq!(y, 0.0);
    }
}
