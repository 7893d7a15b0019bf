/// Topic interest bookkeeping for one session
///
/// The registry is the source of truth for which topics the session wants.
/// The server's record is rebuilt from it on every transition into `Open`.
use crate::connection::{ConnectionManager, HookId};
use event_schema::{ControlMessage, Topic};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

struct RegistryInner {
    connection: Arc<ConnectionManager>,
    topics: Mutex<BTreeSet<Topic>>,
}

impl RegistryInner {
    fn send_if_open(&self, message: ControlMessage) -> bool {
        if !self.connection.is_open() {
            debug!(kind = message.kind(), "Not open, deferring to next resync");
            return false;
        }
        self.connection.send(&message)
    }

    fn resync(&self) -> usize {
        let topics: Vec<Topic> = self.topics.lock().iter().copied().collect();
        let sent = topics
            .into_iter()
            .filter(|topic| self.send_if_open(ControlMessage::subscribe(*topic)))
            .count();
        info!(topics = sent, "Resynchronised topic subscriptions");
        sent
    }
}

pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
    hook: HookId,
}

impl SubscriptionRegistry {
    /// Create a registry bound to a connection
    ///
    /// Registers an open hook that retransmits the whole topic set.
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        let inner = Arc::new(RegistryInner {
            connection,
            topics: Mutex::new(BTreeSet::new()),
        });

        let weak = Arc::downgrade(&inner);
        let hook = inner.connection.on_open(move || {
            if let Some(inner) = weak.upgrade() {
                inner.resync();
            }
        });

        Self { inner, hook }
    }

    /// Add a topic; returns `true` if it was not already held
    ///
    /// While open, the subscribe message is sent on every call.
    pub fn subscribe(&self, topic: Topic) -> bool {
        let added = self.inner.topics.lock().insert(topic);
        debug!(%topic, added, "subscribe");
        self.inner.send_if_open(ControlMessage::subscribe(topic));
        added
    }

    /// Remove a topic; returns `true` if it was held
    pub fn unsubscribe(&self, topic: Topic) -> bool {
        let removed = self.inner.topics.lock().remove(&topic);
        debug!(%topic, removed, "unsubscribe");
        self.inner.send_if_open(ControlMessage::unsubscribe(topic));
        removed
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.inner.topics.lock().contains(topic)
    }

    /// Current topic set in its deterministic order
    pub fn topics(&self) -> Vec<Topic> {
        self.inner.topics.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.topics.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.topics.lock().is_empty()
    }

    /// Retransmit every held topic; returns how many messages were sent
    pub fn resync(&self) -> usize {
        self.inner.resync()
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.inner.connection
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.inner.connection.remove_open_hook(self.hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{Connector, Transport};
    use async_trait::async_trait;
    use resilience::ReconnectPolicy;
    use uuid::Uuid;

    struct NeverConnector;

    #[async_trait]
    impl Connector for NeverConnector {
        async fn connect(&self, _url: &str) -> Result<Transport, TransportError> {
            Err(TransportError::Refused("offline".into()))
        }
    }

    fn registry() -> SubscriptionRegistry {
        let connection = Arc::new(ConnectionManager::new(
            "ws://localhost/ws",
            Arc::new(NeverConnector),
            ReconnectPolicy::default(),
        ));
        SubscriptionRegistry::new(connection)
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = registry();
        let topic = Topic::class(Uuid::new_v4());

        assert!(registry.subscribe(topic));
        assert!(!registry.subscribe(topic));
        assert_eq!(registry.topics(), vec![topic]);
    }

    #[test]
    fn test_unsubscribe_missing_topic() {
        let registry = registry();
        let topic = Topic::organization(Uuid::new_v4());

        assert!(!registry.unsubscribe(topic));
        registry.subscribe(topic);
        assert!(registry.unsubscribe(topic));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_topics_are_ordered() {
        let registry = registry();
        let org = Topic::organization(Uuid::nil());
        let class = Topic::class(Uuid::nil());

        registry.subscribe(org);
        registry.subscribe(class);

        assert_eq!(registry.topics(), vec![class, org]);
        assert!(registry.contains(&org));
    }

    #[test]
    fn test_resync_while_idle_sends_nothing() {
        let registry = registry();
        registry.subscribe(Topic::class(Uuid::new_v4()));
        assert_eq!(registry.resync(), 0);
    }
}
