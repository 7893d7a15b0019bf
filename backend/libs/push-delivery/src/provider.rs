use crate::errors::DeliveryError;
use async_trait::async_trait;
use event_schema::{PushPayload, PushSubscription};
use serde::Serialize;
use tracing::debug;

/// Trait for push delivery providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Delivers one rendered notification to one subscription
    ///
    /// # Returns
    /// `Ok(())` once the provider accepted the message, `Err(DeliveryError)` otherwise
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), DeliveryError>;
}

/// Push gateway configuration
#[derive(Debug, Clone)]
pub struct WebPushGatewayConfig {
    /// Base URL of the web-push gateway, e.g. `https://push-gateway.internal`
    pub gateway_url: String,
    pub api_key: Option<String>,
    /// Time the push service keeps an undelivered message
    pub ttl_secs: u32,
}

impl WebPushGatewayConfig {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            api_key: None,
            ttl_secs: 86_400,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn send_url(&self) -> String {
        format!("{}/v1/send", self.gateway_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    subscription: &'a PushSubscription,
    payload: &'a PushPayload,
    ttl: u32,
}

/// Provider that hands notifications to an HTTP web-push gateway
///
/// The gateway owns VAPID signing and payload encryption; this side only maps
/// its HTTP answers onto delivery errors.
pub struct WebPushGatewayProvider {
    config: WebPushGatewayConfig,
    http_client: reqwest::Client,
}

impl WebPushGatewayProvider {
    pub fn new(config: WebPushGatewayConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PushProvider for WebPushGatewayProvider {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), DeliveryError> {
        let body = GatewayRequest {
            subscription,
            payload,
            ttl: self.config.ttl_secs,
        };

        let mut request = self.http_client.post(self.config.send_url()).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!("Push gateway accepted notification for {}", subscription.endpoint);
            return Ok(());
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(classify_status(status.as_u16(), text))
    }
}

/// Map a non-success gateway status onto a delivery error
pub(crate) fn classify_status(status: u16, body: String) -> DeliveryError {
    match status {
        404 | 410 => DeliveryError::Gone(body),
        429 => DeliveryError::RateLimited,
        500..=599 => DeliveryError::Upstream { status, body },
        _ => DeliveryError::Rejected { status, body },
    }
}
