/// Wire schema shared by the realtime client and the notification service
///
/// Every frame on the live channel, in both directions, is a JSON envelope:
///
/// ```json
/// { "type": "availability_update", "data": { "classId": "..." }, "timestamp": 1729339200000 }
/// ```
///
/// - `control`: client → server messages (authenticate, topic interest)
/// - `events`: server → client events (availability, bookings, reminders, attendance)
/// - `push`: payload and subscription shapes for the out-of-band push channel
pub mod control;
pub mod envelope;
pub mod error;
pub mod events;
pub mod push;
pub mod topic;

pub use control::ControlMessage;
pub use envelope::Envelope;
pub use error::ProtocolError;
pub use events::{
    AttendanceStatus, AttendanceUpdate, AvailabilityUpdate, BookingAction, BookingNotification,
    ClassReminder, ServerEvent, ServerFrame,
};
pub use push::{PushAction, PushPayload, PushSubscription, PushSubscriptionKeys};
pub use topic::Topic;

/// Current wall-clock time in epoch milliseconds, the envelope timestamp unit
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
