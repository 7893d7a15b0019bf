/// HTTP handlers for notification service API
pub mod events;
pub mod push_subscriptions;
pub mod websocket;

use serde::{Deserialize, Serialize};

/// Standard API response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

pub use events::register_routes as register_events;
pub use push_subscriptions::register_routes as register_push_subscriptions;
pub use websocket::register_routes as register_websocket;
