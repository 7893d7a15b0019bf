/// Live WebSocket channel
///
/// 1. SessionHub: sessions, their users and topic interest
/// 2. WsSession: one actor per connection with heartbeat
pub mod manager;
pub mod session;

pub use manager::{SessionHub, SessionId, SessionSender};
pub use session::WsSession;
