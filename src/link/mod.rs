//! Connection side of the control link
//!
//! [`ConnectionManager`] keeps the session alive, [`ControlLink`] puts the
//! scheduler in front of it and [`LinkHandle`] runs the whole thing on a tokio
//! task behind a [`WsTransport`].

pub mod clock;
pub mod control_link;
pub mod latency;
pub mod link_handle;
pub mod manager;
pub mod state;
pub mod transport;
pub mod ws_transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use control_link::ControlLink;
pub use latency::LatencyTracker;
pub use link_handle::{LinkCommand, LinkHandle};
pub use manager::{ConnectionManager, ConnectionStats, LinkEvent};
pub use state::{ConnectionState, LinkStats, LinkStatus, ReconnectPolicy};
pub use transport::{Transport, TransportEvent, CLOSE_NORMAL};
pub use ws_transport::WsTransport;
