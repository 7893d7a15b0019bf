/// Live session hub
///
/// Server-side registry of WebSocket sessions. Tracks per session:
/// - the optional user bound by `authenticate`
/// - the set of topics it subscribed to
/// - the outbound frame sender feeding its actor
///
/// A topic → sessions index lets `publish` reach exactly the sessions holding
/// the event's topic. Sessions whose sender is closed are pruned on publish.
use crate::metrics;
use event_schema::{ControlMessage, ServerEvent, Topic};
use futures::channel::mpsc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound text frames for one session
pub type SessionSender = mpsc::UnboundedSender<String>;

pub type SessionId = Uuid;

struct SessionEntry {
    user_id: Option<Uuid>,
    topics: HashSet<Topic>,
    sender: SessionSender,
}

#[derive(Default)]
struct HubState {
    sessions: HashMap<SessionId, SessionEntry>,
    topics: HashMap<Topic, HashSet<SessionId>>,
}

impl HubState {
    fn detach(&mut self, session_id: SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&session_id)?;
        for topic in &entry.topics {
            if let Some(members) = self.topics.get_mut(topic) {
                members.remove(&session_id);
                if members.is_empty() {
                    self.topics.remove(topic);
                }
            }
        }
        Some(entry)
    }
}

#[derive(Default)]
pub struct SessionHub {
    state: RwLock<HubState>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session with its outbound sender
    pub fn register(&self, sender: SessionSender) -> SessionId {
        let session_id = Uuid::new_v4();
        let count = {
            let mut state = self.state.write();
            state.sessions.insert(
                session_id,
                SessionEntry {
                    user_id: None,
                    topics: HashSet::new(),
                    sender,
                },
            );
            state.sessions.len()
        };
        metrics::set_connected_sessions(count);
        debug!(%session_id, "Session registered");
        session_id
    }

    /// Drop a session and all its topic memberships
    pub fn remove(&self, session_id: SessionId) -> bool {
        let (removed, count) = {
            let mut state = self.state.write();
            let removed = state.detach(session_id).is_some();
            (removed, state.sessions.len())
        };
        if removed {
            metrics::set_connected_sessions(count);
            debug!(%session_id, "Session removed");
        }
        removed
    }

    pub fn authenticate(&self, session_id: SessionId, user_id: Uuid) -> bool {
        match self.state.write().sessions.get_mut(&session_id) {
            Some(entry) => {
                entry.user_id = Some(user_id);
                info!(%session_id, %user_id, "Session authenticated");
                true
            }
            None => false,
        }
    }

    /// Add a topic to a session; returns `true` if newly added
    pub fn subscribe(&self, session_id: SessionId, topic: Topic) -> bool {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let Some(entry) = state.sessions.get_mut(&session_id) else {
            return false;
        };
        let added = entry.topics.insert(topic);
        state.topics.entry(topic).or_default().insert(session_id);
        added
    }

    /// Remove a topic from a session; returns `true` if it was held
    pub fn unsubscribe(&self, session_id: SessionId, topic: Topic) -> bool {
        let mut state = self.state.write();
        let removed = state
            .sessions
            .get_mut(&session_id)
            .map(|entry| entry.topics.remove(&topic))
            .unwrap_or(false);
        if let Some(members) = state.topics.get_mut(&topic) {
            members.remove(&session_id);
            if members.is_empty() {
                state.topics.remove(&topic);
            }
        }
        removed
    }

    /// Apply a client control message to its session
    pub fn apply_control(&self, session_id: SessionId, message: &ControlMessage) {
        match message {
            ControlMessage::Authenticate { user_id } => {
                self.authenticate(session_id, *user_id);
            }
            ControlMessage::SubscribeClass { class_id } => {
                self.subscribe(session_id, Topic::Class(*class_id));
            }
            ControlMessage::SubscribeOrganization { organization_id } => {
                self.subscribe(session_id, Topic::Organization(*organization_id));
            }
            ControlMessage::UnsubscribeClass { class_id } => {
                self.unsubscribe(session_id, Topic::Class(*class_id));
            }
            ControlMessage::UnsubscribeOrganization { organization_id } => {
                self.unsubscribe(session_id, Topic::Organization(*organization_id));
            }
        }
    }

    /// Send an event to every session holding its class topic
    ///
    /// Returns the number of sessions the frame was written to.
    pub fn publish(&self, event: &ServerEvent) -> usize {
        self.publish_to(event, &[event.topic()])
    }

    /// Send an event once to every session holding any of `topics`
    ///
    /// A session subscribed to several of the topics still gets one frame.
    pub fn publish_to(&self, event: &ServerEvent, topics: &[Topic]) -> usize {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = event.kind(), "Failed to encode server event: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let state = self.state.read();
            let targets: HashSet<SessionId> = topics
                .iter()
                .filter_map(|topic| state.topics.get(topic))
                .flatten()
                .copied()
                .collect();
            for session_id in targets {
                let Some(entry) = state.sessions.get(&session_id) else {
                    continue;
                };
                if entry.sender.unbounded_send(text.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(session_id);
                }
            }
        }

        for session_id in dead {
            warn!(%session_id, "Pruning session with closed sender");
            self.remove(session_id);
        }

        metrics::record_live_frames(event.kind(), delivered);
        debug!(kind = event.kind(), ?topics, delivered, "Published live event");
        delivered
    }

    /// Whether any session of `user_id` currently holds `topic`
    pub fn is_user_subscribed(&self, user_id: Uuid, topic: &Topic) -> bool {
        self.is_user_subscribed_any(user_id, std::slice::from_ref(topic))
    }

    /// Whether any session of `user_id` currently holds one of `topics`
    pub fn is_user_subscribed_any(&self, user_id: Uuid, topics: &[Topic]) -> bool {
        let state = self.state.read();
        topics
            .iter()
            .filter_map(|topic| state.topics.get(topic))
            .flatten()
            .any(|session_id| {
                state
                    .sessions
                    .get(session_id)
                    .is_some_and(|entry| entry.user_id == Some(user_id) && !entry.sender.is_closed())
            })
    }

    pub fn session_topics(&self, session_id: SessionId) -> Vec<Topic> {
        self.state
            .read()
            .sessions
            .get(&session_id)
            .map(|entry| entry.topics.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.state
            .read()
            .topics
            .get(topic)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Distinct authenticated users with at least one session
    pub fn connected_users(&self) -> usize {
        self.state
            .read()
            .sessions
            .values()
            .filter_map(|entry| entry.user_id)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn topic_count(&self) -> usize {
        self.state.read().topics.len()
    }
}
