//! Telemetry link of the OpenController virtual input device
//!
//! Raw control values are shaped ([`shaping`]), encoded ([`codec`]), throttled
//! and queued ([`scheduler`]) and sent over a self-healing websocket session
//! ([`link`]) to the device server.

pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod mapping;
pub mod scheduler;
pub mod shaping;

pub use error::LinkError;
pub use link::{ControlLink, LinkHandle};
