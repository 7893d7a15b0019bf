use crate::error::ClientError;
use resilience::ReconnectPolicy;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// Live channel client configuration
///
/// Read from `REALTIME_*` environment variables:
/// `REALTIME_URL`, `REALTIME_MAX_RECONNECT_ATTEMPTS`,
/// `REALTIME_RECONNECT_BASE_DELAY_MS`, `REALTIME_SESSION_TOKEN`, `REALTIME_USER_ID`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

fn default_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            session_token: None,
            user_id: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: ClientConfig = envy::prefixed("REALTIME_").from_iter(vars)?;
        if !(config.url.starts_with("ws://") || config.url.starts_with("wss://")) {
            return Err(ClientError::InvalidUrl(config.url));
        }
        Ok(config)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.max_reconnect_attempts,
            Duration::from_millis(self.reconnect_base_delay_ms),
        )
    }
}

/// Append the session token as a `token` query parameter
pub(crate) fn url_with_token(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}token={}", url, sep, urlencoding::encode(token))
        }
        None => url.to_string(),
    }
}
