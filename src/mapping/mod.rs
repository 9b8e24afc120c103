//! Control mapping
//!
//! Which device output each control identifier drives, and the registry of
//! per-widget defaults used to build layouts.

pub mod bindings;
pub mod registry;

pub use bindings::{resolve_button_assignments, AxisName, Binding, ControlBindings, MAX_BUTTONS};
pub use registry::{hshifter_button, ControlDefinition, ControlKind, ControlLayout};
