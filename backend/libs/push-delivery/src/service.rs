/// Push delivery service
///
/// Covers both halves of the push channel:
/// - user agent side: capability check, permission, subscribe/unsubscribe
/// - delivery side: single and batch sends through a provider
///
/// Nothing here panics or returns errors across the public boundary. Missing
/// capabilities degrade to `false` / `None` / failed results.
use crate::errors::DeliveryError;
use crate::platform::{PermissionState, PushPlatform};
use crate::provider::PushProvider;
use event_schema::{PushPayload, PushSubscription};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use resilience::{with_deadline, TimeoutError};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outcome of delivering to one subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub endpoint: String,
    pub success: bool,
    pub error: Option<String>,
    /// Subscription is gone and should be dropped by the caller
    pub should_invalidate: bool,
}

impl DeliveryResult {
    fn ok(subscription: &PushSubscription) -> Self {
        Self {
            endpoint: subscription.endpoint.clone(),
            success: true,
            error: None,
            should_invalidate: false,
        }
    }

    fn failed(subscription: &PushSubscription, error: &DeliveryError) -> Self {
        Self {
            endpoint: subscription.endpoint.clone(),
            success: false,
            error: Some(error.to_string()),
            should_invalidate: error.is_stale_subscription(),
        }
    }
}

pub struct PushDeliveryService {
    platform: Option<Arc<dyn PushPlatform>>,
    provider: Option<Arc<dyn PushProvider>>,
    application_server_key: String,
    send_timeout: Duration,
    current: Mutex<Option<PushSubscription>>,
}

impl PushDeliveryService {
    /// Create a service with neither platform nor provider attached
    ///
    /// # Arguments
    /// * `application_server_key` - public key the push service binds subscriptions to
    pub fn new(application_server_key: impl Into<String>) -> Self {
        Self {
            platform: None,
            provider: None,
            application_server_key: application_server_key.into(),
            send_timeout: Duration::from_secs(10),
            current: Mutex::new(None),
        }
    }

    pub fn with_platform(mut self, platform: Arc<dyn PushPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Supported only if the platform has both a permission mechanism and
    /// persistent background registration
    pub fn is_supported(&self) -> bool {
        self.supported_platform().is_some()
    }

    fn supported_platform(&self) -> Option<&Arc<dyn PushPlatform>> {
        self.platform
            .as_ref()
            .filter(|p| p.supports_permissions() && p.supports_background_registration())
    }

    pub fn permission(&self) -> PermissionState {
        self.supported_platform()
            .map(|p| p.permission())
            .unwrap_or(PermissionState::Denied)
    }

    /// Ask for notification permission; `true` only on explicit grant
    ///
    /// A denied permission is terminal and is not asked again.
    pub async fn request_permission(&self) -> bool {
        let Some(platform) = self.supported_platform() else {
            debug!("Push not supported, permission request skipped");
            return false;
        };

        match platform.permission() {
            PermissionState::Granted => return true,
            PermissionState::Denied => {
                info!("Notification permission previously denied");
                return false;
            }
            PermissionState::Default => {}
        }

        match platform.request_permission().await {
            PermissionState::Granted => true,
            PermissionState::Denied => {
                info!("Notification permission denied by user");
                false
            }
            PermissionState::Default => false,
        }
    }

    /// Register with the push service, returning the subscription or `None`
    pub async fn subscribe(&self) -> Option<PushSubscription> {
        let platform = self.supported_platform()?;

        if let Some(existing) = self.current.lock().clone() {
            return Some(existing);
        }

        match platform.register(&self.application_server_key).await {
            Ok(subscription) => {
                info!("Push subscription created for {}", subscription.endpoint);
                *self.current.lock() = Some(subscription.clone());
                Some(subscription)
            }
            Err(e) => {
                warn!("Push subscription failed: {}", e);
                None
            }
        }
    }

    /// Best-effort removal of the current subscription
    pub async fn unsubscribe(&self) -> bool {
        let Some(platform) = self.supported_platform() else {
            return false;
        };

        let Some(subscription) = self.current.lock().take() else {
            return false;
        };

        match platform.unregister(&subscription.endpoint).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Push unsubscribe failed for {}: {}", subscription.endpoint, e);
                false
            }
        }
    }

    pub fn current_subscription(&self) -> Option<PushSubscription> {
        self.current.lock().clone()
    }

    /// Send one notification; failures are logged and reported, never raised
    pub async fn send_notification(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> DeliveryResult {
        let Some(provider) = &self.provider else {
            warn!("Push provider not configured");
            return DeliveryResult::failed(subscription, &DeliveryError::NotConfigured);
        };

        let outcome = with_deadline(self.send_timeout, provider.deliver(subscription, payload))
            .await
            .map_err(|e| match e {
                TimeoutError::Elapsed(d) => DeliveryError::Timeout(d),
                TimeoutError::Inner(inner) => inner,
            });

        match outcome {
            Ok(()) => {
                debug!("Push delivered to {}", subscription.endpoint);
                DeliveryResult::ok(subscription)
            }
            Err(e) => {
                warn!("Push delivery to {} failed: {}", subscription.endpoint, e);
                DeliveryResult::failed(subscription, &e)
            }
        }
    }

    /// Send to every subscription independently
    ///
    /// All-settled: one result per subscription, in input order. A failing or
    /// panicking send never affects the others.
    pub async fn send_to_multiple(
        &self,
        subscriptions: &[PushSubscription],
        payload: &PushPayload,
    ) -> Vec<DeliveryResult> {
        info!("Sending {} push notifications in batch", subscriptions.len());

        let sends = subscriptions.iter().map(|subscription| async move {
            match AssertUnwindSafe(self.send_notification(subscription, payload))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    error!("Push send task panicked for {}", subscription.endpoint);
                    DeliveryResult {
                        endpoint: subscription.endpoint.clone(),
                        success: false,
                        error: Some("delivery task panicked".to_string()),
                        should_invalidate: false,
                    }
                }
            }
        });
        let results = join_all(sends).await;

        let success_count = results.iter().filter(|r| r.success).count();
        info!(
            "Batch send complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}
