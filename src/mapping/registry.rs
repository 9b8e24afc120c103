//! Control registry
//!
//! Default bindings and shaping per widget kind, plus the layout type that ties
//! control identifiers to them.

use super::bindings::{resolve_button_assignments, AxisName, Binding, ControlBindings};
use crate::shaping::{AxisConfig, AxisMode, CurveSpec, GateConfig, StickConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const STEERING_DEADZONE: f32 = 0.02;
pub const STEERING_SOFT_CENTER: f32 = 0.6;
pub const PEDAL_DEADZONE: f32 = 0.02;
pub const PEDAL_EXPO: f32 = 2.0;
pub const JOYSTICK_DEADZONE: f32 = 0.1;

/// H-shifter neutral position button
pub const HSHIFTER_NEUTRAL_BUTTON: u8 = 9;

/// H-shifter gate endpoints and the button each one presses
pub const HSHIFTER_GEARS: [(&str, u8); 7] = [
    ("1", 10),
    ("2", 11),
    ("3", 12),
    ("4", 13),
    ("5", 14),
    ("6", 15),
    ("R", 16),
];

/// Button pressed for a gear label, `None` for an unknown label
pub fn hshifter_button(gear: &str) -> Option<u8> {
    HSHIFTER_GEARS
        .iter()
        .find(|(label, _)| *label == gear)
        .map(|(_, button)| *button)
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Steering,
    Pedal,
    Button,
    Joystick,
    HShifter,
}

impl ControlKind {
    /// Default output binding for a widget of this kind
    ///
    /// Joysticks drive two axes; this is the horizontal one (see
    /// [`ControlKind::joystick_bindings`]).
    pub fn default_binding(self) -> Binding {
        match self {
            ControlKind::Steering => Binding::Axis {
                axis: AxisName::X,
                mode: AxisMode::Centered,
            },
            ControlKind::Pedal => Binding::Axis {
                axis: AxisName::Y,
                mode: AxisMode::Normal,
            },
            ControlKind::Joystick => Self::joystick_bindings().0,
            ControlKind::Button => Binding::Button { number: None },
            ControlKind::HShifter => Binding::Button {
                number: Some(HSHIFTER_NEUTRAL_BUTTON),
            },
        }
    }

    pub fn joystick_bindings() -> (Binding, Binding) {
        (
            Binding::Axis {
                axis: AxisName::Rx,
                mode: AxisMode::Centered,
            },
            Binding::Axis {
                axis: AxisName::Ry,
                mode: AxisMode::Centered,
            },
        )
    }

    /// Default shaping, `None` for digital controls
    pub fn default_shaping(self) -> Option<AxisConfig> {
        let resolved = match self {
            ControlKind::Steering => AxisConfig::new(
                STEERING_DEADZONE,
                1.0,
                Some(CurveSpec::SoftCenter {
                    amount: STEERING_SOFT_CENTER,
                }),
                AxisMode::Centered,
            ),
            ControlKind::Pedal => AxisConfig::new(
                PEDAL_DEADZONE,
                1.0,
                Some(CurveSpec::Expo { amount: PEDAL_EXPO }),
                AxisMode::Normal,
            ),
            ControlKind::Joystick => AxisConfig::new(
                JOYSTICK_DEADZONE,
                1.0,
                Some(CurveSpec::Linear),
                AxisMode::Centered,
            ),
            ControlKind::Button | ControlKind::HShifter => return None,
        };
        match resolved {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Invalid default shaping for {:?}: {}", self, e);
                None
            }
        }
    }

    pub fn default_stick() -> StickConfig {
        let axis = Self::Joystick.default_shaping().unwrap_or_default();
        StickConfig {
            x: axis.clone(),
            y: axis,
            gate: GateConfig::circular(),
        }
    }
}

/// One control of a layout
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ControlDefinition {
    pub id: u16,
    pub label: String,
    pub kind: ControlKind,
    pub binding: Binding,
    /// Shaping for analog controls; digital controls send their value unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shaping: Option<AxisConfig>,
}

impl ControlDefinition {
    /// Control with the registry defaults for `kind`
    pub fn with_defaults(id: u16, label: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            binding: kind.default_binding(),
            shaping: kind.default_shaping(),
        }
    }

    pub fn is_analog(&self) -> bool {
        matches!(self.binding, Binding::Axis { .. })
    }
}

/// Named set of controls
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ControlLayout {
    pub layout_id: String,
    #[serde(default)]
    pub controls: Vec<ControlDefinition>,
}

impl ControlLayout {
    pub fn new(layout_id: impl Into<String>) -> Self {
        Self {
            layout_id: layout_id.into(),
            controls: Vec::new(),
        }
    }

    pub fn push(&mut self, control: ControlDefinition) {
        self.controls.push(control);
    }

    /// Adds a joystick as two controls, `id` for X and `id + 1` for Y
    pub fn push_joystick(&mut self, id: u16, label: &str) {
        let (x_binding, y_binding) = ControlKind::joystick_bindings();
        let shaping = ControlKind::Joystick.default_shaping();
        self.controls.push(ControlDefinition {
            id,
            label: format!("{} X", label),
            kind: ControlKind::Joystick,
            binding: x_binding,
            shaping: shaping.clone(),
        });
        self.controls.push(ControlDefinition {
            id: id.saturating_add(1),
            label: format!("{} Y", label),
            kind: ControlKind::Joystick,
            binding: y_binding,
            shaping,
        });
    }

    pub fn control(&self, id: u16) -> Option<&ControlDefinition> {
        self.controls.iter().find(|c| c.id == id)
    }

    pub fn bindings(&self) -> ControlBindings {
        self.controls.iter().map(|c| (c.id, c.binding)).collect()
    }

    /// Resolves button numbers in place, see [`resolve_button_assignments`]
    pub fn resolve_buttons(&mut self) -> Vec<(u16, u8)> {
        let changed =
            resolve_button_assignments(self.controls.iter_mut().map(|c| (c.id, &mut c.binding)));
        for (id, number) in &changed {
            info!("Layout {}: control {} assigned to button {}", self.layout_id, id, number);
        }
        changed
    }
}

impl Default for ControlLayout {
    /// Wheel layout: steering, throttle, brake, two buttons and a joystick
    fn default() -> Self {
        let mut layout = ControlLayout::new("default");
        layout.push(ControlDefinition::with_defaults(1, "Steering", ControlKind::Steering));
        layout.push(ControlDefinition::with_defaults(2, "Throttle", ControlKind::Pedal));
        let mut brake = ControlDefinition::with_defaults(3, "Brake", ControlKind::Pedal);
        brake.binding = Binding::Axis {
            axis: AxisName::Z,
            mode: AxisMode::Normal,
        };
        layout.push(brake);
        layout.push(ControlDefinition::with_defaults(10, "A", ControlKind::Button));
        layout.push(ControlDefinition::with_defaults(11, "B", ControlKind::Button));
        layout.push_joystick(20, "Stick");
        layout.resolve_buttons();
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaping::shape;

    #[test]
    fn test_steering_defaults() {
        let steering = ControlDefinition::with_defaults(1, "Wheel", ControlKind::Steering);
        let shaping = steering.shaping.unwrap();
        assert_eq!(shaping.deadzone(), STEERING_DEADZONE);
        assert_eq!(
            shaping.curve(),
            Some(&CurveSpec::SoftCenter { amount: 0.6 })
        );
        assert_eq!(shape(1.0, &shaping), 1.0);
    }

    #[test]
    fn test_pedal_defaults_are_normal_mode() {
        let pedal = ControlKind::Pedal.default_shaping().unwrap();
        assert_eq!(pedal.mode(), AxisMode::Normal);
        assert_eq!(shape(-1.0, &pedal), 0.0);
    }

    #[test]
    fn test_default_layout_resolves_buttons() {
        let layout = ControlLayout::default();
        assert_eq!(
            layout.control(10).unwrap().binding,
            Binding::Button { number: Some(1) }
        );
        assert_eq!(
            layout.control(11).unwrap().binding,
            Binding::Button { number: Some(2) }
        );
        assert_eq!(
            layout.control(21).unwrap().binding,
            Binding::Axis {
                axis: AxisName::Ry,
                mode: AxisMode::Centered
            }
        );
        assert_eq!(layout.bindings().len(), 7);
    }

    #[test]
    fn test_hshifter_buttons() {
        assert_eq!(hshifter_button("1"), Some(10));
        assert_eq!(hshifter_button("R"), Some(16));
        assert_eq!(hshifter_button("7"), None);
    }

    #[test]
    fn test_layout_round_trips_through_toml() {
        let layout = ControlLayout::default();
        let text = toml::to_string_pretty(&layout).unwrap();
        let parsed: ControlLayout = toml::from_str(&text).unwrap();
        assert_eq!(parsed, layout);
    }
}
