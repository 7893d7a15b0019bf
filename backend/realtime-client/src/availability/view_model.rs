/// Derived availability state for one class
///
/// Seeded from a snapshot, then mutated only through `apply_update` /
/// `record_booking`. The server is authoritative: spot counts are replaced,
/// never merged arithmetically.
use super::activity::RollingLog;
use event_schema::{AvailabilityUpdate, BookingAction, BookingNotification, ServerEvent, ServerFrame};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Activity entries kept per class
pub const ACTIVITY_CAPACITY: usize = 3;

/// Initial full state supplied by the booking page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    pub available_spots: u32,
    pub total_spots: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityState {
    pub available_spots: u32,
    pub total_spots: u32,
    pub waitlist_count: Option<u32>,
}

impl AvailabilityState {
    pub fn status(&self) -> StatusTier {
        StatusTier::from_counts(self.available_spots, self.total_spots)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTier {
    Full,
    AlmostFull,
    FillingUp,
    Available,
}

impl StatusTier {
    /// `0` is Full, up to 20% Almost Full, up to 50% Filling Up
    pub fn from_counts(available: u32, total: u32) -> Self {
        let (available, total) = (u64::from(available), u64::from(total));
        if available == 0 || total == 0 {
            StatusTier::Full
        } else if available * 5 <= total {
            StatusTier::AlmostFull
        } else if available * 2 <= total {
            StatusTier::FillingUp
        } else {
            StatusTier::Available
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusTier::Full => "Full",
            StatusTier::AlmostFull => "Almost Full",
            StatusTier::FillingUp => "Filling Up",
            StatusTier::Available => "Available",
        }
    }
}

impl fmt::Display for StatusTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-facing notice, emitted only when availability crosses zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityNotice {
    SpotOpened { class_id: Uuid, available_spots: u32 },
    NowFull { class_id: Uuid },
}

impl AvailabilityNotice {
    pub fn message(&self) -> String {
        match self {
            AvailabilityNotice::SpotOpened {
                available_spots: 1, ..
            } => "A spot just opened up!".to_string(),
            AvailabilityNotice::SpotOpened {
                available_spots, ..
            } => format!("{} spots just opened up!", available_spots),
            AvailabilityNotice::NowFull { .. } => "This class is now full".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub participant_name: String,
    pub action: BookingAction,
    /// Epoch milliseconds of the server frame
    pub timestamp: i64,
}

impl ActivityEntry {
    pub fn describe(&self) -> String {
        match self.action {
            BookingAction::Booked => format!("{} booked a spot", self.participant_name),
            BookingAction::Cancelled => {
                format!("{} cancelled their booking", self.participant_name)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityViewModel {
    class_id: Uuid,
    state: AvailabilityState,
    activity: RollingLog<ActivityEntry>,
}

impl AvailabilityViewModel {
    pub fn new(class_id: Uuid, snapshot: AvailabilitySnapshot) -> Self {
        Self {
            class_id,
            state: AvailabilityState {
                available_spots: snapshot.available_spots,
                total_spots: snapshot.total_spots,
                waitlist_count: None,
            },
            activity: RollingLog::new(ACTIVITY_CAPACITY),
        }
    }

    pub fn class_id(&self) -> Uuid {
        self.class_id
    }

    pub fn state(&self) -> AvailabilityState {
        self.state
    }

    pub fn status(&self) -> StatusTier {
        self.state.status()
    }

    /// Recent booking activity, newest first
    pub fn recent_activity(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.activity.iter()
    }

    /// Replace the counts with the server's values
    ///
    /// Returns a notice only on the `0 -> >0` and `>0 -> 0` edges. Updates for
    /// other classes are ignored.
    pub fn apply_update(&mut self, update: &AvailabilityUpdate) -> Option<AvailabilityNotice> {
        if update.class_id != self.class_id {
            debug!(class_id = %update.class_id, "Ignoring availability update for other class");
            return None;
        }

        let previous = self.state.available_spots;
        self.state.available_spots = update.available_spots;
        self.state.total_spots = update.total_spots;
        if update.waitlist_count.is_some() {
            self.state.waitlist_count = update.waitlist_count;
        }

        match (previous, update.available_spots) {
            (0, n) if n > 0 => Some(AvailabilityNotice::SpotOpened {
                class_id: self.class_id,
                available_spots: n,
            }),
            (p, 0) if p > 0 => Some(AvailabilityNotice::NowFull {
                class_id: self.class_id,
            }),
            _ => None,
        }
    }

    /// Append a booking to the activity log; returns `false` for other classes
    pub fn record_booking(&mut self, notification: &BookingNotification, timestamp: i64) -> bool {
        if notification.class_id != self.class_id {
            return false;
        }
        self.activity.push(ActivityEntry {
            participant_name: notification.participant_name.clone(),
            action: notification.action,
            timestamp,
        });
        true
    }

    /// Apply any inbound frame; events that do not affect availability are ignored
    pub fn apply(&mut self, frame: &ServerFrame) -> Option<AvailabilityNotice> {
        match &frame.event {
            ServerEvent::AvailabilityUpdate(update) => self.apply_update(update),
            ServerEvent::BookingNotification(notification) => {
                self.record_booking(notification, frame.timestamp);
                None
            }
            ServerEvent::ClassReminder(_) | ServerEvent::AttendanceUpdate(_) => None,
        }
    }
}
