/// Typed local publish/subscribe
///
/// Fans transport frames and connection lifecycle signals out to registered
/// handlers. Handlers for one kind run synchronously in registration order;
/// a handler that errors or panics is logged and the rest still run.
use anyhow::Result;
use event_schema::{ServerEvent, ServerFrame};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    ReconnectExhausted,
    AvailabilityUpdate,
    BookingNotification,
    ClassReminder,
    AttendanceUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Live channel opened
    Connected,
    /// Live channel dropped without being asked to; a reconnect is scheduled
    Disconnected { reason: String },
    /// Terminal: reconnecting gave up, a fresh `connect()` is required
    ReconnectExhausted { attempts: u32 },
    Server(ServerFrame),
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Connected => EventKind::Connected,
            ClientEvent::Disconnected { .. } => EventKind::Disconnected,
            ClientEvent::ReconnectExhausted { .. } => EventKind::ReconnectExhausted,
            ClientEvent::Server(frame) => match frame.event {
                ServerEvent::AvailabilityUpdate(_) => EventKind::AvailabilityUpdate,
                ServerEvent::BookingNotification(_) => EventKind::BookingNotification,
                ServerEvent::ClassReminder(_) => EventKind::ClassReminder,
                ServerEvent::AttendanceUpdate(_) => EventKind::AttendanceUpdate,
            },
        }
    }
}

pub type Handler = Arc<dyn Fn(&ClientEvent) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind
    ///
    /// Returns an id to pass to [`EventDispatcher::off`] on teardown.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ClientEvent) -> Result<()> + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler; returns whether it was registered
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&kind);
        }
        removed
    }

    /// Invoke every handler registered for the event's kind
    ///
    /// Returns how many handlers completed without error.
    pub fn emit(&self, event: &ClientEvent) -> usize {
        let kind = event.kind();
        // Snapshot so handlers may call on/off without deadlocking
        let snapshot: Vec<(HandlerId, Handler)> = match self.handlers.read().get(&kind) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut ok = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => warn!(?kind, handler = id.0, "Event handler failed: {:#}", e),
                Err(_) => error!(?kind, handler = id.0, "Event handler panicked"),
            }
        }
        ok
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map(|v| v.len()).unwrap_or(0)
    }

    /// Drop every registered handler
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}
