/// Server → client events
///
/// Events are immutable once emitted. Each is scoped to a class topic and is
/// delivered only to sessions holding that topic.
use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// EVENT PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate {
    pub class_id: Uuid,
    pub available_spots: u32,
    pub total_spots: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waitlist_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingAction {
    Booked,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingNotification {
    pub class_id: Uuid,
    pub class_name: String,
    pub participant_name: String,
    pub action: BookingAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReminder {
    pub class_id: Uuid,
    pub class_name: String,
    pub starts_at: DateTime<Utc>,
    pub minutes_until_start: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    pub class_id: Uuid,
    pub class_name: String,
    pub participant_name: String,
    pub status: AttendanceStatus,
}

// ============================================================================
// TAGGED UNION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    AvailabilityUpdate(AvailabilityUpdate),
    BookingNotification(BookingNotification),
    ClassReminder(ClassReminder),
    AttendanceUpdate(AttendanceUpdate),
}

impl ServerEvent {
    pub const AVAILABILITY_UPDATE: &'static str = "availability_update";
    pub const BOOKING_NOTIFICATION: &'static str = "booking_notification";
    pub const CLASS_REMINDER: &'static str = "class_reminder";
    pub const ATTENDANCE_UPDATE: &'static str = "attendance_update";

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::AvailabilityUpdate(_) => Self::AVAILABILITY_UPDATE,
            ServerEvent::BookingNotification(_) => Self::BOOKING_NOTIFICATION,
            ServerEvent::ClassReminder(_) => Self::CLASS_REMINDER,
            ServerEvent::AttendanceUpdate(_) => Self::ATTENDANCE_UPDATE,
        }
    }

    pub fn class_id(&self) -> Uuid {
        match self {
            ServerEvent::AvailabilityUpdate(e) => e.class_id,
            ServerEvent::BookingNotification(e) => e.class_id,
            ServerEvent::ClassReminder(e) => e.class_id,
            ServerEvent::AttendanceUpdate(e) => e.class_id,
        }
    }

    /// Topic a session must hold to receive this event
    pub fn topic(&self) -> Topic {
        Topic::Class(self.class_id())
    }

    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            ServerEvent::AvailabilityUpdate(e) => Envelope::new(self.kind(), e),
            ServerEvent::BookingNotification(e) => Envelope::new(self.kind(), e),
            ServerEvent::ClassReminder(e) => Envelope::new(self.kind(), e),
            ServerEvent::AttendanceUpdate(e) => Envelope::new(self.kind(), e),
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind.as_str() {
            Self::AVAILABILITY_UPDATE => Ok(ServerEvent::AvailabilityUpdate(envelope.decode_data()?)),
            Self::BOOKING_NOTIFICATION => {
                Ok(ServerEvent::BookingNotification(envelope.decode_data()?))
            }
            Self::CLASS_REMINDER => Ok(ServerEvent::ClassReminder(envelope.decode_data()?)),
            Self::ATTENDANCE_UPDATE => Ok(ServerEvent::AttendanceUpdate(envelope.decode_data()?)),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.to_envelope()?.to_json()
    }
}

/// A decoded server event with the timestamp it was sent with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFrame {
    pub event: ServerEvent,
    /// Epoch milliseconds, as stamped by the sender
    pub timestamp: i64,
}

impl ServerFrame {
    /// Parse a raw text frame received from the server
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let envelope = Envelope::parse(text)?;
        Ok(Self {
            event: ServerEvent::from_envelope(&envelope)?,
            timestamp: envelope.timestamp,
        })
    }
}
