/// Realtime availability client
///
/// Keeps a booking view in sync with the server over one live channel:
///
/// - `connection`: owned connection with bounded exponential reconnect
/// - `subscriptions`: topic set, fully retransmitted on every open
/// - `dispatcher`: typed fan-out of server events and lifecycle signals
/// - `availability`: per-class view model and its mount/unmount binding
/// - `transport`: injectable connector, WebSocket by default
pub mod availability;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod subscriptions;
pub mod transport;

pub use availability::{
    AvailabilityBinding, AvailabilityNotice, AvailabilitySnapshot, AvailabilityState,
    AvailabilityViewModel, RollingLog, StatusTier,
};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, HookId};
pub use dispatcher::{ClientEvent, EventDispatcher, EventKind, HandlerId};
pub use error::{ClientError, TransportError};
pub use subscriptions::SubscriptionRegistry;
pub use transport::{Connector, Transport, WsConnector};
