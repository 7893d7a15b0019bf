/// Push Delivery Library
///
/// Out-of-band delivery for users who are not connected to the live channel.
///
/// It handles:
/// - Capability probing of the push-capable user agent
/// - Permission and push subscription lifecycle
/// - Single and batch delivery through a provider abstraction
/// - Marking stale subscriptions for the caller to drop
pub mod errors;
pub mod platform;
pub mod provider;
pub mod service;

pub use errors::{DeliveryError, PushError};
pub use platform::{PermissionState, PushPlatform};
pub use provider::{PushProvider, WebPushGatewayConfig, WebPushGatewayProvider};
pub use service::{DeliveryResult, PushDeliveryService};
