/// Binds an availability view model to the live channel
///
/// `mount` subscribes the class topic and registers dispatcher handlers that
/// feed the shared view model. Transition notices are forwarded on a channel
/// for the UI to show. `unmount` (or dropping the binding) deregisters the
/// handlers and releases the topic.
use super::view_model::{
    AvailabilityNotice, AvailabilitySnapshot, AvailabilityState, AvailabilityViewModel, StatusTier,
};
use crate::dispatcher::{ClientEvent, EventDispatcher, EventKind, HandlerId};
use crate::subscriptions::SubscriptionRegistry;
use event_schema::Topic;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

pub struct AvailabilityBinding {
    class_id: Uuid,
    view: Arc<Mutex<AvailabilityViewModel>>,
    dispatcher: Arc<EventDispatcher>,
    registry: Arc<SubscriptionRegistry>,
    handlers: Vec<(EventKind, HandlerId)>,
    mounted: bool,
}

impl AvailabilityBinding {
    /// Mount a view for one class
    ///
    /// # Arguments
    /// * `registry` - Subscription registry of the session's connection
    /// * `class_id` - Class whose availability is shown
    /// * `snapshot` - Initial counts loaded by the page
    pub fn mount(
        registry: Arc<SubscriptionRegistry>,
        class_id: Uuid,
        snapshot: AvailabilitySnapshot,
    ) -> (Self, mpsc::UnboundedReceiver<AvailabilityNotice>) {
        let dispatcher = registry.connection().dispatcher().clone();
        let view = Arc::new(Mutex::new(AvailabilityViewModel::new(class_id, snapshot)));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let mut handlers = Vec::with_capacity(2);
        for kind in [EventKind::AvailabilityUpdate, EventKind::BookingNotification] {
            let view = view.clone();
            let notice_tx = notice_tx.clone();
            let id = dispatcher.on(kind, move |event| {
                if let ClientEvent::Server(frame) = event {
                    if let Some(notice) = view.lock().apply(frame) {
                        // Receiver gone means the UI stopped listening
                        let _ = notice_tx.send(notice);
                    }
                }
                Ok(())
            });
            handlers.push((kind, id));
        }

        registry.subscribe(Topic::class(class_id));
        debug!(%class_id, "Availability view mounted");

        let binding = Self {
            class_id,
            view,
            dispatcher,
            registry,
            handlers,
            mounted: true,
        };
        (binding, notice_rx)
    }

    pub fn class_id(&self) -> Uuid {
        self.class_id
    }

    pub fn state(&self) -> AvailabilityState {
        self.view.lock().state()
    }

    pub fn status(&self) -> StatusTier {
        self.view.lock().status()
    }

    /// Human-readable recent activity, newest first
    pub fn recent_activity(&self) -> Vec<String> {
        self.view
            .lock()
            .recent_activity()
            .map(|entry| entry.describe())
            .collect()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Deregister handlers and release the class topic
    ///
    /// The topic is released even if another view of the same class is still
    /// mounted on this registry.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        for (kind, id) in self.handlers.drain(..) {
            self.dispatcher.off(kind, id);
        }
        self.registry.unsubscribe(Topic::class(self.class_id));
        debug!(class_id = %self.class_id, "Availability view unmounted");
    }
}

impl Drop for AvailabilityBinding {
    fn drop(&mut self) {
        self.unmount();
    }
}
