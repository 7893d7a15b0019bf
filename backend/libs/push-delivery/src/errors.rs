use std::time::Duration;
use thiserror::Error;

/// Registration failure reported by the user agent
///
/// Permission refusal is not an error here; it is `PermissionState::Denied`.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("push registration failed: {0}")]
    Registration(String),
}

/// Errors from a provider while delivering one notification
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("push provider not configured")]
    NotConfigured,

    #[error("subscription gone: {0}")]
    Gone(String),

    #[error("rate limited by push provider")]
    RateLimited,

    #[error("push provider rejected notification: {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("push provider unavailable: {status} - {body}")]
    Upstream { status: u16, body: String },

    #[error("push request failed: {0}")]
    Request(String),

    #[error("push delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl DeliveryError {
    /// The endpoint will never accept deliveries again
    pub fn is_stale_subscription(&self) -> bool {
        matches!(self, DeliveryError::Gone(_))
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Request(err.to_string())
    }
}
