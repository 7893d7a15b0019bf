/// Push subscriptions per user
use async_trait::async_trait;
use dashmap::DashMap;
use event_schema::PushSubscription;
use uuid::Uuid;

#[async_trait]
pub trait PushSubscriptionStore: Send + Sync {
    /// Store or replace (by endpoint) a user's subscription
    async fn save(&self, user_id: Uuid, subscription: PushSubscription);

    /// Remove by endpoint; returns whether it existed
    async fn remove(&self, user_id: Uuid, endpoint: &str) -> bool;

    async fn for_user(&self, user_id: Uuid) -> Vec<PushSubscription>;
}

/// Process-local store; subscriptions are lost on restart
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: DashMap<Uuid, Vec<PushSubscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.subscriptions.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl PushSubscriptionStore for InMemorySubscriptionStore {
    async fn save(&self, user_id: Uuid, subscription: PushSubscription) {
        let subscription = subscription.for_user(user_id);
        let mut entry = self.subscriptions.entry(user_id).or_default();
        entry.retain(|s| s.endpoint != subscription.endpoint);
        entry.push(subscription);
    }

    async fn remove(&self, user_id: Uuid, endpoint: &str) -> bool {
        let removed = match self.subscriptions.get_mut(&user_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|s| s.endpoint != endpoint);
                entry.len() != before
            }
            None => false,
        };
        self.subscriptions.remove_if(&user_id, |_, subs| subs.is_empty());
        removed
    }

    async fn for_user(&self, user_id: Uuid) -> Vec<PushSubscription> {
        self.subscriptions
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
