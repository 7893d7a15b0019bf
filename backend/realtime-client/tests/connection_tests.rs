//! Connection lifecycle tests against an in-memory scripted transport
//!
//! Time is paused, so reconnect backoff runs instantly and delays are exact.

use async_trait::async_trait;
use event_schema::{AvailabilityUpdate, ControlMessage, ServerEvent, Topic};
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use realtime_client::{
    AvailabilityBinding, AvailabilityNotice, AvailabilitySnapshot, ClientEvent, ConnectionManager,
    ConnectionState, Connector, EventKind, SubscriptionRegistry, Transport, TransportError,
};
use resilience::ReconnectPolicy;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// Server side of an in-memory transport
struct ServerEnd {
    to_client: fmpsc::UnboundedSender<Result<String, TransportError>>,
    from_client: fmpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    async fn next_control(&mut self) -> ControlMessage {
        let text = self
            .from_client
            .next()
            .await
            .expect("client closed the transport");
        ControlMessage::from_json(&text).expect("client sent an invalid control message")
    }

    fn push(&self, text: impl Into<String>) {
        self.to_client
            .unbounded_send(Ok(text.into()))
            .expect("client stream closed");
    }
}

fn pipe() -> (Transport, ServerEnd) {
    let (client_tx, from_client) = fmpsc::unbounded::<String>();
    let (to_client, client_rx) = fmpsc::unbounded::<Result<String, TransportError>>();

    let sink = client_tx.sink_map_err(|e| TransportError::Send(e.to_string()));
    let transport = Transport::new(sink, client_rx);
    (
        transport,
        ServerEnd {
            to_client,
            from_client,
        },
    )
}

/// Hands out scripted transports in order, refusing once the script runs out
#[derive(Default)]
struct ScriptedConnector {
    script: Mutex<VecDeque<Transport>>,
    attempts: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedConnector {
    fn with(transports: Vec<Transport>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(transports.into()),
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    fn attempt_gaps(&self) -> Vec<Duration> {
        let attempts = self.attempts.lock();
        attempts
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError> {
        self.attempts.lock().push((Instant::now(), url.to_string()));
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Refused("no server".into()))
    }
}

fn manager(connector: Arc<ScriptedConnector>) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        "ws://test/ws",
        connector,
        ReconnectPolicy::new(5, Duration::from_millis(1000)),
    ))
}

async fn wait_for_state(manager: &ConnectionManager, wanted: ConnectionState) {
    let mut rx = manager.subscribe_state();
    rx.wait_for(|state| *state == wanted)
        .await
        .expect("state channel closed");
}

fn availability_frame(class_id: Uuid, spots: u32) -> String {
    ServerEvent::AvailabilityUpdate(AvailabilityUpdate {
        class_id,
        available_spots: spots,
        total_spots: 20,
        waitlist_count: None,
    })
    .to_json()
    .unwrap()
}

// ============================================================================
// RECONNECT POLICY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_exhaustion_after_sixth_failure() {
    let connector = ScriptedConnector::with(vec![]);
    let manager = manager(connector.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    manager
        .dispatcher()
        .on(EventKind::ReconnectExhausted, move |event| {
            if let ClientEvent::ReconnectExhausted { attempts } = event {
                tx.send(*attempts).unwrap();
            }
            Ok(())
        });

    assert!(manager.connect(None));
    let attempts = rx.recv().await.unwrap();

    assert_eq!(attempts, 5);
    assert_eq!(connector.attempt_count(), 6);
    assert_eq!(
        connector.attempt_gaps(),
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(4000),
            Duration::from_millis(8000),
            Duration::from_millis(16000),
        ]
    );
    assert_eq!(manager.state(), ConnectionState::Idle);

    // No further attempts are scheduled
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.attempt_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_connect_after_exhaustion() {
    let connector = ScriptedConnector::with(vec![]);
    let manager = manager(connector.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    manager
        .dispatcher()
        .on(EventKind::ReconnectExhausted, move |_| {
            tx.send(()).unwrap();
            Ok(())
        });

    manager.connect(None);
    rx.recv().await.unwrap();

    let (transport, _server) = pipe();
    connector.script.lock().push_back(transport);
    assert!(manager.connect(None));
    wait_for_state(&manager, ConnectionState::Open).await;
    assert_eq!(connector.attempt_count(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_connect_ignored_while_active() {
    let (transport, _server) = pipe();
    let connector = ScriptedConnector::with(vec![transport]);
    let manager = manager(connector.clone());

    assert!(manager.connect(Some("secret token")));
    assert!(!manager.connect(None));
    wait_for_state(&manager, ConnectionState::Open).await;

    let attempts = connector.attempts.lock();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].1, "ws://test/ws?token=secret%20token");
}

// ============================================================================
// RESYNC AFTER RECONNECT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_authenticate_and_resync_on_every_open() {
    let (first, mut server1) = pipe();
    let (second, mut server2) = pipe();
    let connector = ScriptedConnector::with(vec![first, second]);
    let manager = manager(connector.clone());
    let registry = SubscriptionRegistry::new(manager.clone());

    let class = Topic::class(Uuid::new_v4());
    let org = Topic::organization(Uuid::new_v4());
    let user_id = Uuid::new_v4();

    // Registered while idle: nothing is sent yet
    registry.subscribe(class);
    registry.subscribe(org);
    assert!(!manager.authenticate(user_id));

    let (tx, mut disconnects) = mpsc::unbounded_channel();
    let weak = Arc::downgrade(&manager);
    manager.dispatcher().on(EventKind::Disconnected, move |_| {
        let manager = weak.upgrade().unwrap();
        tx.send((manager.state(), manager.is_open())).unwrap();
        Ok(())
    });

    manager.connect(None);

    assert_eq!(
        server1.next_control().await,
        ControlMessage::Authenticate { user_id }
    );
    assert_eq!(server1.next_control().await, ControlMessage::subscribe(class));
    assert_eq!(server1.next_control().await, ControlMessage::subscribe(org));

    // Server goes away
    drop(server1);
    let (state_at_drop, open_at_drop) = disconnects.recv().await.unwrap();
    assert_eq!(state_at_drop, ConnectionState::Reconnecting { attempt: 1 });
    assert!(!open_at_drop);

    assert_eq!(
        server2.next_control().await,
        ControlMessage::Authenticate { user_id }
    );
    assert_eq!(server2.next_control().await, ControlMessage::subscribe(class));
    assert_eq!(server2.next_control().await, ControlMessage::subscribe(org));
    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(connector.attempt_gaps(), vec![Duration::from_millis(1000)]);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_while_open_sends_each_call() {
    let (transport, mut server) = pipe();
    let manager = manager(ScriptedConnector::with(vec![transport]));
    let registry = SubscriptionRegistry::new(manager.clone());

    manager.connect(None);
    wait_for_state(&manager, ConnectionState::Open).await;

    let topic = Topic::class(Uuid::new_v4());
    assert!(registry.subscribe(topic));
    assert!(!registry.subscribe(topic));
    assert!(registry.unsubscribe(topic));

    assert_eq!(server.next_control().await, ControlMessage::subscribe(topic));
    assert_eq!(server.next_control().await, ControlMessage::subscribe(topic));
    assert_eq!(
        server.next_control().await,
        ControlMessage::unsubscribe(topic)
    );
}

// ============================================================================
// OUTBOUND AND INBOUND FRAMES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_send_dropped_when_not_open() {
    let manager = manager(ScriptedConnector::with(vec![]));
    let message = ControlMessage::subscribe(Topic::class(Uuid::new_v4()));

    assert!(!manager.send(&message));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_and_unknown_frames_are_dropped() {
    let (transport, server) = pipe();
    let manager = manager(ScriptedConnector::with(vec![transport]));
    let class_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel();
    manager
        .dispatcher()
        .on(EventKind::AvailabilityUpdate, move |event| {
            if let ClientEvent::Server(frame) = event {
                tx.send(frame.event.clone()).unwrap();
            }
            Ok(())
        });

    manager.connect(None);
    wait_for_state(&manager, ConnectionState::Open).await;

    server.push("not json at all");
    server.push(r#"{"type":"mystery","data":{},"timestamp":1}"#);
    server.push(r#"{"type":"availability_update","data":{"classId":"nope"},"timestamp":1}"#);
    server.push(availability_frame(class_id, 3));

    let event = rx.recv().await.unwrap();
    assert_eq!(event.class_id(), class_id);
    assert!(rx.try_recv().is_err());
    assert_eq!(manager.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_events_applied_in_send_order() {
    let (transport, server) = pipe();
    let manager = manager(ScriptedConnector::with(vec![transport]));
    let class_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel();
    manager
        .dispatcher()
        .on(EventKind::AvailabilityUpdate, move |event| {
            if let ClientEvent::Server(frame) = event {
                if let ServerEvent::AvailabilityUpdate(update) = &frame.event {
                    tx.send(update.available_spots).unwrap();
                }
            }
            Ok(())
        });

    manager.connect(None);
    wait_for_state(&manager, ConnectionState::Open).await;

    for spots in [3, 2, 1] {
        server.push(availability_frame(class_id, spots));
    }

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(rx.recv().await.unwrap());
    }
    assert_eq!(seen, vec![3, 2, 1]);
}

// ============================================================================
// DISCONNECT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_returns_to_idle_and_stops_reconnecting() {
    let (transport, mut server) = pipe();
    let connector = ScriptedConnector::with(vec![transport]);
    let manager = manager(connector.clone());
    let _registry = SubscriptionRegistry::new(manager.clone());

    manager.dispatcher().on(EventKind::Connected, |_| Ok(()));

    manager.connect(None);
    wait_for_state(&manager, ConnectionState::Open).await;

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert_eq!(manager.dispatcher().handler_count(EventKind::Connected), 0);

    // Transport is closed from the client side
    assert!(server.from_client.next().await.is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempt_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let connector = ScriptedConnector::with(vec![]);
    let manager = manager(connector.clone());

    manager.connect(None);
    wait_for_state(&manager, ConnectionState::Reconnecting { attempt: 1 }).await;
    assert_eq!(connector.attempt_count(), 1);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Idle);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.attempt_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Idle);
}

// ============================================================================
// AVAILABILITY BINDING
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_binding_forwards_zero_edge_notices() {
    let (transport, mut server) = pipe();
    let manager = manager(ScriptedConnector::with(vec![transport]));
    let registry = Arc::new(SubscriptionRegistry::new(manager.clone()));
    let class_id = Uuid::new_v4();

    let (mut binding, mut notices) = AvailabilityBinding::mount(
        registry.clone(),
        class_id,
        AvailabilitySnapshot {
            available_spots: 0,
            total_spots: 20,
        },
    );
    assert!(registry.contains(&Topic::class(class_id)));

    manager.connect(None);
    assert_eq!(
        server.next_control().await,
        ControlMessage::subscribe(Topic::class(class_id))
    );

    server.push(availability_frame(class_id, 1));
    server.push(availability_frame(class_id, 2));
    server.push(availability_frame(class_id, 0));

    assert_eq!(
        notices.recv().await.unwrap(),
        AvailabilityNotice::SpotOpened {
            class_id,
            available_spots: 1
        }
    );
    assert_eq!(
        notices.recv().await.unwrap(),
        AvailabilityNotice::NowFull { class_id }
    );
    assert_eq!(binding.state().available_spots, 0);

    assert!(binding.is_mounted());
    binding.unmount();
    assert!(!binding.is_mounted());
    assert!(notices.recv().await.is_none());
    assert!(!registry.contains(&Topic::class(class_id)));
    assert_eq!(
        manager.dispatcher().handler_count(EventKind::AvailabilityUpdate),
        0
    );
    assert_eq!(
        server.next_control().await,
        ControlMessage::unsubscribe(Topic::class(class_id))
    );
}
