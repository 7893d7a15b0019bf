/// Domain events ingested from the booking-state collaborator and the
/// delivery bookkeeping produced while routing them
use chrono::{DateTime, NaiveDate, Utc};
use event_schema::{
    AttendanceStatus, AttendanceUpdate, AvailabilityUpdate, BookingAction, BookingNotification,
    ClassReminder, ServerEvent, Topic,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::templates::NotificationTemplate;

// ============================================================================
// DOMAIN EVENTS
// ============================================================================

/// A booking was created or cancelled; carries the new counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingChange {
    pub class_id: Uuid,
    pub class_name: String,
    pub participant_name: String,
    pub available_spots: u32,
    pub total_spots: u32,
    #[serde(default)]
    pub waitlist_count: Option<u32>,
    /// Studio that owns the class; its organization topic also gets the live frames
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReminderDue {
    pub class_id: Uuid,
    pub class_name: String,
    pub starts_at: DateTime<Utc>,
    pub minutes_until_start: u32,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMarked {
    pub class_id: Uuid,
    pub class_name: String,
    pub participant_name: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReminderDue {
    pub class_id: Uuid,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReminderDue {
    pub class_id: Uuid,
    pub class_name: String,
    /// Preformatted amount, e.g. `$25.00`
    pub amount: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingCreated(BookingChange),
    BookingCancelled(BookingChange),
    ClassReminderDue(ClassReminderDue),
    AttendanceMarked(AttendanceMarked),
    AttendanceReminderDue(AttendanceReminderDue),
    PaymentReminderDue(PaymentReminderDue),
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated(_) => "booking_created",
            DomainEvent::BookingCancelled(_) => "booking_cancelled",
            DomainEvent::ClassReminderDue(_) => "class_reminder_due",
            DomainEvent::AttendanceMarked(_) => "attendance_marked",
            DomainEvent::AttendanceReminderDue(_) => "attendance_reminder_due",
            DomainEvent::PaymentReminderDue(_) => "payment_reminder_due",
        }
    }

    pub fn class_id(&self) -> Uuid {
        match self {
            DomainEvent::BookingCreated(e) | DomainEvent::BookingCancelled(e) => e.class_id,
            DomainEvent::ClassReminderDue(e) => e.class_id,
            DomainEvent::AttendanceMarked(e) => e.class_id,
            DomainEvent::AttendanceReminderDue(e) => e.class_id,
            DomainEvent::PaymentReminderDue(e) => e.class_id,
        }
    }

    pub fn organization_id(&self) -> Option<Uuid> {
        match self {
            DomainEvent::BookingCreated(e) | DomainEvent::BookingCancelled(e) => e.organization_id,
            DomainEvent::ClassReminderDue(e) => e.organization_id,
            DomainEvent::AttendanceMarked(_)
            | DomainEvent::AttendanceReminderDue(_)
            | DomainEvent::PaymentReminderDue(_) => None,
        }
    }

    /// Topics whose sessions receive the live events: the class, plus the
    /// owning organization when known
    pub fn live_topics(&self) -> Vec<Topic> {
        let mut topics = vec![Topic::class(self.class_id())];
        topics.extend(self.organization_id().map(Topic::organization));
        topics
    }

    /// Server events published to every session holding one of the live topics
    pub fn live_events(&self) -> Vec<ServerEvent> {
        match self {
            DomainEvent::BookingCreated(change) => vec![
                ServerEvent::AvailabilityUpdate(availability(change)),
                ServerEvent::BookingNotification(booking(change, BookingAction::Booked)),
            ],
            DomainEvent::BookingCancelled(change) => vec![
                ServerEvent::AvailabilityUpdate(availability(change)),
                ServerEvent::BookingNotification(booking(change, BookingAction::Cancelled)),
            ],
            DomainEvent::ClassReminderDue(due) => vec![ServerEvent::ClassReminder(ClassReminder {
                class_id: due.class_id,
                class_name: due.class_name.clone(),
                starts_at: due.starts_at,
                minutes_until_start: due.minutes_until_start,
            })],
            DomainEvent::AttendanceMarked(marked) => {
                vec![ServerEvent::AttendanceUpdate(AttendanceUpdate {
                    class_id: marked.class_id,
                    class_name: marked.class_name.clone(),
                    participant_name: marked.participant_name.clone(),
                    status: marked.status,
                })]
            }
            DomainEvent::AttendanceReminderDue(_) | DomainEvent::PaymentReminderDue(_) => vec![],
        }
    }

    /// Whether a recipient counts as reached when a live session of theirs
    /// holds one of the live topics
    pub fn has_live_counterpart(&self) -> bool {
        !self.live_events().is_empty()
    }

    /// Out-of-band template for recipients not reached live
    pub fn template(&self) -> Option<NotificationTemplate> {
        match self {
            DomainEvent::BookingCreated(change) => Some(NotificationTemplate::NewBooking {
                class_id: change.class_id,
                class_name: change.class_name.clone(),
                participant_name: change.participant_name.clone(),
            }),
            DomainEvent::BookingCancelled(change) => Some(NotificationTemplate::Cancellation {
                class_id: change.class_id,
                class_name: change.class_name.clone(),
                participant_name: change.participant_name.clone(),
            }),
            DomainEvent::ClassReminderDue(due) => Some(NotificationTemplate::ClassReminder {
                class_id: due.class_id,
                class_name: due.class_name.clone(),
                minutes_until_start: due.minutes_until_start,
            }),
            DomainEvent::AttendanceMarked(_) => None,
            DomainEvent::AttendanceReminderDue(due) => {
                Some(NotificationTemplate::AttendanceReminder {
                    class_id: due.class_id,
                    class_name: due.class_name.clone(),
                })
            }
            DomainEvent::PaymentReminderDue(due) => Some(NotificationTemplate::PaymentReminder {
                class_id: due.class_id,
                class_name: due.class_name.clone(),
                amount: due.amount.clone(),
                due_date: due.due_date,
            }),
        }
    }
}

fn availability(change: &BookingChange) -> AvailabilityUpdate {
    AvailabilityUpdate {
        class_id: change.class_id,
        available_spots: change.available_spots,
        total_spots: change.total_spots,
        waitlist_count: change.waitlist_count,
    }
}

fn booking(change: &BookingChange, action: BookingAction) -> BookingNotification {
    BookingNotification {
        class_id: change.class_id,
        class_name: change.class_name.clone(),
        participant_name: change.participant_name.clone(),
        action,
    }
}

// ============================================================================
// DELIVERY
// ============================================================================

/// A user to notify about an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub user_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Ingest request body: the event plus who should hear about it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDelivery {
    pub event: DomainEvent,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

/// How one recipient was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Live,
    Push,
    Email,
    /// Nothing to deliver out of band for this event kind
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Live frames written across all subscribed sessions
    pub live_frames: usize,
    pub live: usize,
    pub push: usize,
    pub email: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn record(&mut self, channel: DeliveryChannel) {
        match channel {
            DeliveryChannel::Live => self.live += 1,
            DeliveryChannel::Push => self.push += 1,
            DeliveryChannel::Email => self.email += 1,
            DeliveryChannel::Skipped => self.skipped += 1,
            DeliveryChannel::Failed => self.failed += 1,
        }
    }

    pub fn recipients(&self) -> usize {
        self.live + self.push + self.email + self.skipped + self.failed
    }
}
