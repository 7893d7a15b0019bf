/// Push-capable user agent contract
///
/// Implemented by the embedding application (browser bridge, mobile shell).
/// Push delivery only checks and drives it; it never assumes a platform exists.
use crate::errors::PushError;
use async_trait::async_trait;
use event_schema::PushSubscription;

/// Notification permission as reported by the user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Not asked yet, or the prompt was dismissed
    Default,
    Granted,
    /// Terminal: the user has to change it in platform settings
    Denied,
}

#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Platform exposes a notification permission mechanism
    fn supports_permissions(&self) -> bool;

    /// Platform supports persistent background registration (service worker or equivalent)
    fn supports_background_registration(&self) -> bool;

    fn permission(&self) -> PermissionState;

    /// Prompt the user. Must be called from a user gesture.
    async fn request_permission(&self) -> PermissionState;

    /// Register with the push service using the application server public key
    async fn register(&self, application_server_key: &str) -> Result<PushSubscription, PushError>;

    /// Drop the registration for `endpoint`
    async fn unregister(&self, endpoint: &str) -> Result<bool, PushError>;
}
