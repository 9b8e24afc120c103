//! Response curves
//!
//! Pure functions mapping a value in `[-1, 1]` onto `[-1, 1]`. Every curve is odd
//! (sign preserving) so a centered axis behaves the same on both sides.

use crate::error::ShapingError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPO_AMOUNT: f32 = 2.0;
pub const DEFAULT_SOFT_CENTER_AMOUNT: f32 = 0.5;

fn default_expo_amount() -> f32 {
    DEFAULT_EXPO_AMOUNT
}

fn default_soft_center_amount() -> f32 {
    DEFAULT_SOFT_CENTER_AMOUNT
}

/// A single control point of a custom curve
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
}

impl CurvePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Response curve selection
///
/// Serialized with an internal `type` tag, e.g. `{ type = "expo", amount = 2.0 }`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CurveSpec {
    #[default]
    Linear,

    /// `sign(x) * |x|^amount`
    Expo {
        #[serde(default = "default_expo_amount")]
        amount: f32,
    },

    /// `x^3`
    Cubic,

    /// `sign(x) * |x| / (|x| + amount)`, flattens the response away from center
    SoftCenter {
        #[serde(default = "default_soft_center_amount")]
        amount: f32,
    },

    /// Piecewise linear over `|x|`, points sorted by `x`
    Custom { points: Vec<CurvePoint> },
}

impl CurveSpec {
    pub fn expo() -> Self {
        CurveSpec::Expo {
            amount: DEFAULT_EXPO_AMOUNT,
        }
    }

    pub fn soft_center() -> Self {
        CurveSpec::SoftCenter {
            amount: DEFAULT_SOFT_CENTER_AMOUNT,
        }
    }

    /// Checks the curve parameters
    ///
    /// # Errors
    ///
    /// Returns [`ShapingError::InvalidCurveSpec`] when:
    ///
    /// * an expo or soft-center `amount` is not a finite positive number
    /// * a custom curve has fewer than two points
    /// * custom points are not finite, leave the unit square or do not strictly
    ///   ascend in `x`
    pub fn validate(&self) -> Result<(), ShapingError> {
        match self {
            CurveSpec::Linear | CurveSpec::Cubic => Ok(()),
            CurveSpec::Expo { amount } | CurveSpec::SoftCenter { amount } => {
                if amount.is_finite() && *amount > 0.0 {
                    Ok(())
                } else {
                    Err(ShapingError::InvalidCurveSpec(format!(
                        "amount must be finite and > 0, got {}",
                        amount
                    )))
                }
            }
            CurveSpec::Custom { points } => {
                if points.len() < 2 {
                    return Err(ShapingError::InvalidCurveSpec(format!(
                        "custom curve needs at least 2 points, got {}",
                        points.len()
                    )));
                }
                if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                    return Err(ShapingError::InvalidCurveSpec(
                        "custom curve points must be finite".to_string(),
                    ));
                }
                if let Some(p) = points
                    .iter()
                    .find(|p| !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y))
                {
                    return Err(ShapingError::InvalidCurveSpec(format!(
                        "custom curve point ({}, {}) outside [0, 1] x [0, 1]",
                        p.x, p.y
                    )));
                }
                if let Some(pair) = points.windows(2).find(|w| w[1].x <= w[0].x) {
                    return Err(ShapingError::InvalidCurveSpec(format!(
                        "custom curve points must ascend in x ({} then {})",
                        pair[0].x, pair[1].x
                    )));
                }
                Ok(())
            }
        }
    }

    /// Evaluates the curve at `x`
    ///
    /// Expects a curve that passed [`CurveSpec::validate`]; degenerate custom
    /// curves still return a finite value instead of panicking.
    pub fn evaluate(&self, x: f32) -> f32 {
        match self {
            CurveSpec::Linear => x,
            CurveSpec::Expo { amount } => x.signum() * x.abs().powf(*amount),
            CurveSpec::Cubic => x * x * x,
            CurveSpec::SoftCenter { amount } => x.signum() * x.abs() / (x.abs() + amount),
            CurveSpec::Custom { points } => evaluate_custom(points, x),
        }
    }
}

fn evaluate_custom(points: &[CurvePoint], x: f32) -> f32 {
    if points.len() < 2 {
        return x;
    }
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let a = x.abs();

    for pair in points.windows(2) {
        let (p0, p1) = (pair[0], pair[1]);
        if a <= p1.x {
            let dx = p1.x - p0.x;
            if dx <= 0.0 {
                return sign * p1.y;
            }
            let t = ((a - p0.x) / dx).clamp(0.0, 1.0);
            return sign * (p0.y + t * (p1.y - p0.y));
        }
    }

    // No extrapolation past the last point
    match points.last() {
        Some(last) => sign * last.y,
        None => x,
    }
}

/// Applies an optional curve, falling back to identity for absent or invalid specs
pub fn apply_curve(x: f32, curve: Option<&CurveSpec>) -> f32 {
    match curve {
        Some(spec) if spec.validate().is_ok() => spec.evaluate(x),
        _ => x,
    }
}
