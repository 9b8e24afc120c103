//! Control bindings
//!
//! Maps control identifiers onto virtual device outputs: one of the eight device
//! axes or a button number in `1..=32`.

use crate::shaping::AxisMode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

pub const MAX_BUTTONS: u8 = 32;

/// Axes exposed by the virtual device
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AxisName {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
    Slider1,
    Slider2,
}

impl AxisName {
    pub const ALL: [AxisName; 8] = [
        AxisName::X,
        AxisName::Y,
        AxisName::Z,
        AxisName::Rx,
        AxisName::Ry,
        AxisName::Rz,
        AxisName::Slider1,
        AxisName::Slider2,
    ];
}

impl fmt::Display for AxisName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisName::X => "X",
            AxisName::Y => "Y",
            AxisName::Z => "Z",
            AxisName::Rx => "RX",
            AxisName::Ry => "RY",
            AxisName::Rz => "RZ",
            AxisName::Slider1 => "SLIDER1",
            AxisName::Slider2 => "SLIDER2",
        };
        write!(f, "{}", name)
    }
}

/// Output a control drives
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Binding {
    Axis {
        axis: AxisName,
        #[serde(default)]
        mode: AxisMode,
    },
    /// `number` stays empty until button assignment resolves it
    Button {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        number: Option<u8>,
    },
}

/// Control id to binding lookup
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ControlBindings {
    bindings: BTreeMap<u16, Binding>,
}

impl ControlBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, control_id: u16, binding: Binding) -> Option<Binding> {
        self.bindings.insert(control_id, binding)
    }

    pub fn get(&self, control_id: u16) -> Option<&Binding> {
        self.bindings.get(&control_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Binding)> {
        self.bindings.iter().map(|(id, binding)| (*id, binding))
    }
}

impl FromIterator<(u16, Binding)> for ControlBindings {
    fn from_iter<I: IntoIterator<Item = (u16, Binding)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Fills in missing or conflicting button numbers
///
/// Walks `controls` in order. A control keeps its number when it lies in
/// `1..=MAX_BUTTONS` and no earlier control already claimed it; otherwise it gets
/// the lowest free number. Numbers explicitly held by later controls are treated
/// as taken so they are not handed out twice. When all numbers are in use the
/// binding is left empty.
///
/// Returns the `(control_id, number)` pairs that changed.
pub fn resolve_button_assignments<'a, I>(controls: I) -> Vec<(u16, u8)>
where
    I: IntoIterator<Item = (u16, &'a mut Binding)>,
{
    let mut buttons: Vec<(u16, &'a mut Option<u8>)> = controls
        .into_iter()
        .filter_map(|(id, binding)| match binding {
            Binding::Button { number } => Some((id, number)),
            Binding::Axis { .. } => None,
        })
        .collect();

    let reserved: BTreeSet<u8> = buttons
        .iter()
        .filter_map(|(_, number)| **number)
        .filter(|n| (1..=MAX_BUTTONS).contains(n))
        .collect();

    let mut claimed = BTreeSet::new();
    let mut changed = Vec::new();

    for (id, number) in buttons.iter_mut() {
        if let Some(n) = **number {
            if (1..=MAX_BUTTONS).contains(&n) && claimed.insert(n) {
                continue;
            }
        }

        let free = (1..=MAX_BUTTONS).find(|n| !claimed.contains(n) && !reserved.contains(n));
        match free {
            Some(n) => {
                debug!("Auto-assigned control {} to button {}", id, n);
                claimed.insert(n);
                **number = Some(n);
                changed.push((*id, n));
            }
            None => {
                warn!("No free button left for control {}", id);
                **number = None;
            }
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(number: Option<u8>) -> Binding {
        Binding::Button { number }
    }

    #[test]
    fn test_missing_numbers_take_lowest_free() {
        let mut controls = vec![(1, button(Some(1))), (2, button(None)), (3, button(None))];
        let changed = resolve_button_assignments(controls.iter_mut().map(|(id, b)| (*id, b)));
        assert_eq!(changed, vec![(2, 2), (3, 3)]);
    }

    #[test]
    fn test_duplicate_number_is_reassigned() {
        let mut controls = vec![(1, button(Some(4))), (2, button(Some(4)))];
        let changed = resolve_button_assignments(controls.iter_mut().map(|(id, b)| (*id, b)));
        assert_eq!(changed, vec![(2, 1)]);
        assert_eq!(controls[0].1, button(Some(4)));
        assert_eq!(controls[1].1, button(Some(1)));
    }

    #[test]
    fn test_later_explicit_numbers_are_not_stolen() {
        let mut controls = vec![(1, button(None)), (2, button(Some(1)))];
        let changed = resolve_button_assignments(controls.iter_mut().map(|(id, b)| (*id, b)));
        assert_eq!(changed, vec![(1, 2)]);
        assert_eq!(controls[1].1, button(Some(1)));
    }

    #[test]
    fn test_out_of_range_number_is_replaced() {
        let mut controls = vec![(1, button(Some(40)))];
        let changed = resolve_button_assignments(controls.iter_mut().map(|(id, b)| (*id, b)));
        assert_eq!(changed, vec![(1, 1)]);
    }

    #[test]
    fn test_axes_are_left_alone() {
        let axis = Binding::Axis {
            axis: AxisName::X,
            mode: AxisMode::Centered,
        };
        let mut controls = vec![(1, axis), (2, button(None))];
        let changed = resolve_button_assignments(controls.iter_mut().map(|(id, b)| (*id, b)));
        assert_eq!(changed, vec![(2, 1)]);
        assert_eq!(controls[0].1, axis);
    }

    #[test]
    fn test_exhausted_buttons_leave_binding_empty() {
        let mut controls: Vec<(u16, Binding)> =
            (1..=32u8).map(|n| (n as u16, button(Some(n)))).collect();
        controls.push((100, button(None)));
        let changed = resolve_button_assignments(controls.iter_mut().map(|(id, b)| (*id, b)));
        assert!(changed.is_empty());
        assert_eq!(controls[32].1, button(None));
    }

    #[test]
    fn test_axis_name_serialization() {
        assert_eq!(serde_json::to_string(&AxisName::Slider1).unwrap(), "\"SLIDER1\"");
        assert_eq!(serde_json::to_string(&AxisName::Rx).unwrap(), "\"RX\"");
        assert_eq!(AxisName::Ry.to_string(), "RY");
    }
}
