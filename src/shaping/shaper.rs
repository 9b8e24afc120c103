//! Single-axis input shaping
//!
//! Raw widget values go through deadzone, rescale, response curve, peak
//! renormalization and finally the range limit:
//!
//! ```text
//! raw ──► [clamp to domain] ──► [deadzone] ──► [rescale] ──► [curve] ──► [/ |curve(1)|] ──► [* range, clamp]
//! ```
//!
//! The renormalization makes full deflection reach exactly `range` for every
//! curve, including soft-center where `curve(1) = 1 / (1 + amount)`.

use super::curve::{apply_curve, CurveSpec};
use crate::error::ShapingError;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_DEADZONE: f32 = 0.5;

/// Input domain of an axis
///
/// `Centered` axes (steering, sticks) take `[-1, 1]`, `Normal` axes (pedals,
/// sliders) take `[0, 1]`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    #[default]
    Centered,
    Normal,
}

impl AxisMode {
    fn domain(self) -> (f32, f32) {
        match self {
            AxisMode::Centered => (-1.0, 1.0),
            AxisMode::Normal => (0.0, 1.0),
        }
    }
}

fn default_range() -> f32 {
    1.0
}

/// Unresolved axis settings as they appear in configuration files
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AxisSettings {
    #[serde(default)]
    pub deadzone: f32,
    #[serde(default = "default_range")]
    pub range: f32,
    #[serde(default)]
    pub mode: AxisMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<CurveSpec>,
}

/// Validated shaping configuration for one axis
///
/// Built through [`AxisConfig::new`] or deserialized from [`AxisSettings`]. The
/// peak `|curve(1)|` is computed once here instead of per sample. An invalid
/// curve does not reject the config, it degrades to linear with a warning.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "AxisSettings", into = "AxisSettings")]
pub struct AxisConfig {
    deadzone: f32,
    range: f32,
    curve: Option<CurveSpec>,
    mode: AxisMode,
    peak: f32,
}

impl AxisConfig {
    /// Validates and resolves an axis configuration
    ///
    /// # Errors
    ///
    /// * [`ShapingError::InvalidAxisConfig`] - deadzone outside `[0, 0.5]` or
    ///   range outside `(0, 1]`
    pub fn new(
        deadzone: f32,
        range: f32,
        curve: Option<CurveSpec>,
        mode: AxisMode,
    ) -> Result<Self, ShapingError> {
        if !(0.0..=MAX_DEADZONE).contains(&deadzone) {
            return Err(ShapingError::InvalidAxisConfig(format!(
                "deadzone must be within [0, {}], got {}",
                MAX_DEADZONE, deadzone
            )));
        }
        if !(range > 0.0 && range <= 1.0) {
            return Err(ShapingError::InvalidAxisConfig(format!(
                "range must be within (0, 1], got {}",
                range
            )));
        }

        let curve = match curve {
            Some(spec) => match spec.validate() {
                Ok(()) => Some(spec),
                Err(e) => {
                    warn!("Falling back to linear response: {}", e);
                    None
                }
            },
            None => None,
        };

        let peak = apply_curve(1.0, curve.as_ref()).abs();
        let peak = if peak > 0.0 && peak.is_finite() {
            peak
        } else {
            1.0
        };

        Ok(Self {
            deadzone,
            range,
            curve,
            mode,
            peak,
        })
    }

    /// Centered axis without deadzone or curve
    pub fn centered() -> Self {
        Self {
            deadzone: 0.0,
            range: 1.0,
            curve: None,
            mode: AxisMode::Centered,
            peak: 1.0,
        }
    }

    /// Normal (`[0, 1]`) axis without deadzone or curve
    pub fn normal() -> Self {
        Self {
            mode: AxisMode::Normal,
            ..Self::centered()
        }
    }

    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn curve(&self) -> Option<&CurveSpec> {
        self.curve.as_ref()
    }

    pub fn mode(&self) -> AxisMode {
        self.mode
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self::centered()
    }
}

impl TryFrom<AxisSettings> for AxisConfig {
    type Error = ShapingError;

    fn try_from(settings: AxisSettings) -> Result<Self, Self::Error> {
        AxisConfig::new(
            settings.deadzone,
            settings.range,
            settings.curve,
            settings.mode,
        )
    }
}

impl From<AxisConfig> for AxisSettings {
    fn from(config: AxisConfig) -> Self {
        Self {
            deadzone: config.deadzone,
            range: config.range,
            curve: config.curve,
            mode: config.mode,
        }
    }
}

/// Shapes one raw sample
///
/// Total over `f32`: values outside the axis domain are clamped first and NaN is
/// treated as rest position. Inside the deadzone the result is exactly `0.0`.
pub fn shape(raw: f32, config: &AxisConfig) -> f32 {
    let (low, high) = config.mode.domain();
    let raw = if raw.is_nan() { 0.0 } else { raw.clamp(low, high) };

    let magnitude = raw.abs();
    if magnitude < config.deadzone {
        return 0.0;
    }

    let sign = if raw < 0.0 { -1.0 } else { 1.0 };
    let rescaled = sign * (magnitude - config.deadzone) / (1.0 - config.deadzone);
    let curved = apply_curve(rescaled, config.curve.as_ref());
    let normalized = curved / config.peak;

    (normalized * config.range).clamp(-config.range, config.range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inside_deadzone_is_exact_zero() {
        let config = AxisConfig::new(0.1, 1.0, None, AxisMode::Centered).unwrap();
        assert_eq!(shape(0.05, &config), 0.0);
        assert_eq!(shape(-0.099, &config), 0.0);
    }

    #[test]
    fn test_deadzone_edge_rescales_from_zero() {
        let config = AxisConfig::new(0.1, 1.0, None, AxisMode::Centered).unwrap();
        assert_eq!(shape(0.1, &config), 0.0);
        assert!((shape(0.55, &config) - 0.5).abs() < 1e-6);
        assert_eq!(shape(1.0, &config), 1.0);
        assert_eq!(shape(-1.0, &config), -1.0);
    }

    #[test]
    fn test_soft_center_full_deflection_is_exactly_one() {
        let config =
            AxisConfig::new(0.0, 1.0, Some(CurveSpec::soft_center()), AxisMode::Centered)
                .unwrap();
        assert_eq!(shape(1.0, &config), 1.0);
        assert_eq!(shape(-1.0, &config), -1.0);

        let with_deadzone = AxisConfig::new(
            0.02,
            1.0,
            Some(CurveSpec::SoftCenter { amount: 0.6 }),
            AxisMode::Centered,
        )
        .unwrap();
        assert_eq!(shape(1.0, &with_deadzone), 1.0);
    }

    #[test]
    fn test_range_limits_output() {
        let config = AxisConfig::new(0.0, 0.5, Some(CurveSpec::expo()), AxisMode::Centered)
            .unwrap();
        assert_eq!(shape(1.0, &config), 0.5);
        assert_eq!(shape(-3.0, &config), -0.5);
    }

    #[test]
    fn test_normal_mode_clamps_negative_input() {
        let config = AxisConfig::normal();
        assert_eq!(shape(-0.4, &config), 0.0);
        assert_eq!(shape(0.4, &config), 0.4);
        assert_eq!(shape(2.0, &config), 1.0);
    }

    #[test]
    fn test_nan_is_rest_position() {
        assert_eq!(shape(f32::NAN, &AxisConfig::centered()), 0.0);
    }

    #[test]
    fn test_rejects_out_of_range_parameters() {
        assert!(AxisConfig::new(0.6, 1.0, None, AxisMode::Centered).is_err());
        assert!(AxisConfig::new(-0.1, 1.0, None, AxisMode::Centered).is_err());
        assert!(AxisConfig::new(0.1, 0.0, None, AxisMode::Centered).is_err());
        assert!(AxisConfig::new(0.1, 1.5, None, AxisMode::Centered).is_err());
    }

    #[test]
    fn test_invalid_curve_degrades_to_linear() {
        let config = AxisConfig::new(
            0.0,
            1.0,
            Some(CurveSpec::SoftCenter { amount: -1.0 }),
            AxisMode::Centered,
        )
        .unwrap();
        assert!(config.curve().is_none());
        assert!((shape(0.3, &config) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_axis_config_from_toml() {
        let config: AxisConfig = toml::from_str(
            r#"
            deadzone = 0.02
            mode = "normal"
            curve = { type = "expo", amount = 2.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.mode(), AxisMode::Normal);
        assert_eq!(config.range(), 1.0);
        assert_eq!(config.curve(), Some(&CurveSpec::expo()));

        let invalid: Result<AxisConfig, _> = toml::from_str("deadzone = 0.9");
        assert!(invalid.is_err());
    }
}
