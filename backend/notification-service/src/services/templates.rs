/// Notification gateway: domain template → push payload
///
/// Rendering is pure. Every template produces a fixed title/body pair, the
/// shared icon and badge, a `data` object the service worker uses to route
/// clicks, and optional action buttons.
use chrono::NaiveDate;
use event_schema::{PushAction, PushPayload};
use serde_json::json;
use uuid::Uuid;

pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/icons/badge-72x72.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTemplate {
    ClassReminder {
        class_id: Uuid,
        class_name: String,
        minutes_until_start: u32,
    },
    NewBooking {
        class_id: Uuid,
        class_name: String,
        participant_name: String,
    },
    Cancellation {
        class_id: Uuid,
        class_name: String,
        participant_name: String,
    },
    AttendanceReminder {
        class_id: Uuid,
        class_name: String,
    },
    PaymentReminder {
        class_id: Uuid,
        class_name: String,
        amount: String,
        due_date: NaiveDate,
    },
}

impl NotificationTemplate {
    /// Value of `data.type` in the rendered payload
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationTemplate::ClassReminder { .. } => "class_reminder",
            NotificationTemplate::NewBooking { .. } => "new_booking",
            NotificationTemplate::Cancellation { .. } => "cancellation",
            NotificationTemplate::AttendanceReminder { .. } => "attendance_reminder",
            NotificationTemplate::PaymentReminder { .. } => "payment_reminder",
        }
    }

    pub fn class_id(&self) -> Uuid {
        match self {
            NotificationTemplate::ClassReminder { class_id, .. }
            | NotificationTemplate::NewBooking { class_id, .. }
            | NotificationTemplate::Cancellation { class_id, .. }
            | NotificationTemplate::AttendanceReminder { class_id, .. }
            | NotificationTemplate::PaymentReminder { class_id, .. } => *class_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationGateway;

impl NotificationGateway {
    pub fn render(template: &NotificationTemplate) -> PushPayload {
        let class_id = template.class_id();
        let (title, body, url, actions) = match template {
            NotificationTemplate::ClassReminder {
                class_name,
                minutes_until_start,
                ..
            } => (
                "Class Reminder",
                format!("{} starts in {} minutes", class_name, minutes_until_start),
                format!("/classes/{}", class_id),
                Some(vec![
                    PushAction::new("view", "View Class"),
                    PushAction::new("dismiss", "Dismiss"),
                ]),
            ),
            NotificationTemplate::NewBooking {
                class_name,
                participant_name,
                ..
            } => (
                "New Booking",
                format!("{} booked {}", participant_name, class_name),
                format!("/classes/{}/bookings", class_id),
                None,
            ),
            NotificationTemplate::Cancellation {
                class_name,
                participant_name,
                ..
            } => (
                "Booking Cancelled",
                format!(
                    "{} cancelled their booking for {}",
                    participant_name, class_name
                ),
                format!("/classes/{}/bookings", class_id),
                None,
            ),
            NotificationTemplate::AttendanceReminder { class_name, .. } => (
                "Mark Attendance",
                format!("Don't forget to mark attendance for {}", class_name),
                format!("/classes/{}/attendance", class_id),
                Some(vec![PushAction::new("mark-attendance", "Mark Now")]),
            ),
            NotificationTemplate::PaymentReminder {
                class_name,
                amount,
                due_date,
                ..
            } => (
                "Payment Reminder",
                format!(
                    "Payment of {} for {} is due on {}",
                    amount,
                    class_name,
                    due_date.format("%Y-%m-%d")
                ),
                format!("/classes/{}/payment", class_id),
                Some(vec![PushAction::new("pay", "Pay Now")]),
            ),
        };

        PushPayload {
            title: title.to_string(),
            body,
            icon: Some(DEFAULT_ICON.to_string()),
            badge: Some(DEFAULT_BADGE.to_string()),
            data: Some(json!({
                "type": template.kind(),
                "classId": class_id,
                "url": url,
            })),
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_id() -> Uuid {
        Uuid::parse_str("6f1c2a9e-0000-4000-8000-000000000001").unwrap()
    }

    #[test]
    fn test_class_reminder() {
        let payload = NotificationGateway::render(&NotificationTemplate::ClassReminder {
            class_id: class_id(),
            class_name: "Morning Yoga".into(),
            minutes_until_start: 30,
        });

        assert_eq!(payload.title, "Class Reminder");
        assert_eq!(payload.body, "Morning Yoga starts in 30 minutes");
        assert_eq!(payload.icon.as_deref(), Some(DEFAULT_ICON));
        assert_eq!(payload.badge.as_deref(), Some(DEFAULT_BADGE));
        let actions = payload.actions.unwrap();
        assert_eq!(actions[0].action, "view");
        assert_eq!(actions[1].title, "Dismiss");
    }

    #[test]
    fn test_new_booking() {
        let payload = NotificationGateway::render(&NotificationTemplate::NewBooking {
            class_id: class_id(),
            class_name: "Spin 45".into(),
            participant_name: "Ana".into(),
        });

        assert_eq!(payload.title, "New Booking");
        assert_eq!(payload.body, "Ana booked Spin 45");
        assert!(payload.actions.is_none());
        assert_eq!(
            payload.data.unwrap(),
            json!({
                "type": "new_booking",
                "classId": "6f1c2a9e-0000-4000-8000-000000000001",
                "url": "/classes/6f1c2a9e-0000-4000-8000-000000000001/bookings",
            })
        );
    }

    #[test]
    fn test_cancellation() {
        let payload = NotificationGateway::render(&NotificationTemplate::Cancellation {
            class_id: class_id(),
            class_name: "Spin 45".into(),
            participant_name: "Ben".into(),
        });

        assert_eq!(payload.title, "Booking Cancelled");
        assert_eq!(payload.body, "Ben cancelled their booking for Spin 45");
    }

    #[test]
    fn test_attendance_reminder() {
        let payload = NotificationGateway::render(&NotificationTemplate::AttendanceReminder {
            class_id: class_id(),
            class_name: "Pilates".into(),
        });

        assert_eq!(payload.title, "Mark Attendance");
        assert_eq!(payload.body, "Don't forget to mark attendance for Pilates");
        assert_eq!(payload.actions.unwrap()[0].action, "mark-attendance");
    }

    #[test]
    fn test_payment_reminder() {
        let payload = NotificationGateway::render(&NotificationTemplate::PaymentReminder {
            class_id: class_id(),
            class_name: "Boxing".into(),
            amount: "$25.00".into(),
            due_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        });

        assert_eq!(payload.title, "Payment Reminder");
        assert_eq!(payload.body, "Payment of $25.00 for Boxing is due on 2024-06-01");
        assert_eq!(payload.data.unwrap()["type"], "payment_reminder");
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = NotificationTemplate::AttendanceReminder {
            class_id: class_id(),
            class_name: "Pilates".into(),
        };
        assert_eq!(
            NotificationGateway::render(&template),
            NotificationGateway::render(&template)
        );
    }
}
