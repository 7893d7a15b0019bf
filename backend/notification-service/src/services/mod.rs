pub mod email;
pub mod notification_service;
pub mod subscription_store;
pub mod templates;

pub use email::{EmailChannel, SmtpEmailChannel};
pub use notification_service::NotificationService;
pub use subscription_store::{InMemorySubscriptionStore, PushSubscriptionStore};
pub use templates::{NotificationGateway, NotificationTemplate};
