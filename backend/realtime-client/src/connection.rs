/// Live channel connection manager
///
/// Owns the single transport connection of a client session. One background
/// task per `connect()` drives the state machine:
///
/// ```text
/// Idle -> Connecting -> Open -> (dropped) -> Reconnecting -> Connecting -> ...
/// ```
///
/// ending in `Idle` on `disconnect()` or when the reconnect cap is exceeded.
/// Every state change is tagged with the generation of the `connect()` call
/// that produced it, so a stale task can never move a newer session.
use crate::config::{url_with_token, ClientConfig};
use crate::dispatcher::{ClientEvent, EventDispatcher};
use crate::transport::{Connector, Transport};
use event_schema::{ControlMessage, ProtocolError, ServerFrame};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use resilience::ReconnectPolicy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
}

/// Callback run on every transition into `Open`
pub type OpenHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Mutable session control, guarded together so generation checks and state
/// changes are atomic
struct Control {
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    shutdown: Option<oneshot::Sender<()>>,
}

struct Inner {
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    dispatcher: Arc<EventDispatcher>,
    state_tx: watch::Sender<ConnectionState>,
    control: Mutex<Control>,
    user_id: Mutex<Option<Uuid>>,
    open_hooks: Mutex<Vec<(HookId, OpenHook)>>,
    next_hook_id: AtomicU64,
}

enum ServeExit {
    Shutdown,
    Dropped(String),
}

pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                connector,
                policy,
                dispatcher: Arc::new(EventDispatcher::new()),
                state_tx,
                control: Mutex::new(Control {
                    generation: 0,
                    outbound: None,
                    shutdown: None,
                }),
                user_id: Mutex::new(None),
                open_hooks: Mutex::new(Vec::new()),
                next_hook_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(config: &ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let manager = Self::new(config.url.clone(), connector, config.reconnect_policy());
        if let Some(user_id) = config.user_id {
            *manager.inner.user_id.lock() = Some(user_id);
        }
        manager
    }

    /// Dispatcher carrying server events and lifecycle signals
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.inner.dispatcher
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Connectivity indicator for the UI
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Open the live channel in the background
    ///
    /// Must be called from within a tokio runtime. Returns `false` when a
    /// session is already connecting, open or reconnecting.
    ///
    /// # Arguments
    /// * `session_token` - Passed to the server as the `token` query parameter
    pub fn connect(&self, session_token: Option<&str>) -> bool {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let generation = {
            let mut control = self.inner.control.lock();
            let started = self.inner.state_tx.send_if_modified(|state| {
                if *state == ConnectionState::Idle {
                    *state = ConnectionState::Connecting;
                    true
                } else {
                    false
                }
            });
            if !started {
                debug!(state = ?self.state(), "connect() ignored, session already active");
                return false;
            }
            control.generation += 1;
            control.shutdown = Some(shutdown_tx);
            control.generation
        };

        let url = url_with_token(&self.inner.url, session_token);
        info!(generation, "Connecting live channel");
        tokio::spawn(run(self.inner.clone(), generation, url, shutdown_rx));
        true
    }

    /// Close the live channel and return to `Idle`
    ///
    /// Cancels any pending reconnect timer and clears every consumer handler
    /// on the dispatcher. Open hooks stay registered.
    pub fn disconnect(&self) {
        {
            let mut control = self.inner.control.lock();
            control.generation += 1;
            control.outbound = None;
            if let Some(shutdown) = control.shutdown.take() {
                let _ = shutdown.send(());
            }
            self.inner.state_tx.send_replace(ConnectionState::Idle);
        }
        self.inner.dispatcher.clear();
        info!("Live channel disconnected");
    }

    /// Enqueue a control message for the server
    ///
    /// Only succeeds while `Open`; otherwise the message is logged and dropped.
    pub fn send(&self, message: &ControlMessage) -> bool {
        self.inner.send(message)
    }

    /// Bind the session to a user
    ///
    /// Sent immediately when open, and again on every subsequent open before
    /// topics are resynchronised.
    pub fn authenticate(&self, user_id: Uuid) -> bool {
        *self.inner.user_id.lock() = Some(user_id);
        if self.is_open() {
            self.send(&ControlMessage::Authenticate { user_id })
        } else {
            false
        }
    }

    pub fn on_open<F>(&self, hook: F) -> HookId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = HookId(self.inner.next_hook_id.fetch_add(1, Ordering::Relaxed));
        self.inner.open_hooks.lock().push((id, Arc::new(hook)));
        id
    }

    pub fn remove_open_hook(&self, id: HookId) -> bool {
        let mut hooks = self.inner.open_hooks.lock();
        let before = hooks.len();
        hooks.retain(|(h, _)| *h != id);
        hooks.len() != before
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(shutdown) = self.inner.control.lock().shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

async fn run(
    inner: Arc<Inner>,
    generation: u64,
    url: String,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut backoff = inner.policy.tracker();

    loop {
        let result = tokio::select! {
            _ = &mut shutdown => return,
            result = inner.connector.connect(&url) => result,
        };

        match result {
            Ok(transport) => {
                backoff.reset();
                match inner.serve(generation, transport, &mut shutdown).await {
                    ServeExit::Shutdown => return,
                    ServeExit::Dropped(reason) => {
                        if !inner.mark_dropped(generation, backoff.attempt() + 1) {
                            return;
                        }
                        warn!(reason = %reason, "Live channel dropped");
                        inner
                            .dispatcher
                            .emit(&ClientEvent::Disconnected { reason });
                    }
                }
            }
            Err(e) => {
                warn!(attempt = backoff.attempt(), "Connection attempt failed: {}", e);
            }
        }

        match backoff.next_delay() {
            Some(delay) => {
                let attempt = backoff.attempt();
                if !inner.transition(generation, ConnectionState::Reconnecting { attempt }) {
                    return;
                }
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                tokio::select! {
                    _ = &mut shutdown => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                if !inner.transition(generation, ConnectionState::Connecting) {
                    return;
                }
            }
            None => {
                let attempts = backoff.policy().max_attempts;
                if inner.transition(generation, ConnectionState::Idle) {
                    warn!(attempts, "Reconnect attempts exhausted, giving up");
                    inner
                        .dispatcher
                        .emit(&ClientEvent::ReconnectExhausted { attempts });
                }
                return;
            }
        }
    }
}

impl Inner {
    /// Apply a state change only if `generation` is still the live session
    fn transition(&self, generation: u64, next: ConnectionState) -> bool {
        let control = self.control.lock();
        if control.generation != generation {
            return false;
        }
        self.state_tx.send_replace(next);
        true
    }

    /// Leave `Open` before anyone hears about the drop
    fn mark_dropped(&self, generation: u64, next_attempt: u32) -> bool {
        let mut control = self.control.lock();
        if control.generation != generation {
            return false;
        }
        control.outbound = None;
        self.state_tx.send_replace(ConnectionState::Reconnecting {
            attempt: next_attempt,
        });
        true
    }

    fn send(&self, message: &ControlMessage) -> bool {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = message.kind(), "Failed to encode control message: {}", e);
                return false;
            }
        };

        let control = self.control.lock();
        match &control.outbound {
            Some(tx) if tx.send(text).is_ok() => true,
            _ => {
                warn!(
                    kind = message.kind(),
                    "Dropping outbound message, connection not open"
                );
                false
            }
        }
    }

    async fn serve(
        &self,
        generation: u64,
        transport: Transport,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> ServeExit {
        let Transport {
            mut sink,
            mut stream,
        } = transport;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        {
            let mut control = self.control.lock();
            if control.generation != generation {
                return ServeExit::Shutdown;
            }
            // Queued ahead of anything a consumer or hook sends
            if let Some(user_id) = *self.user_id.lock() {
                match (ControlMessage::Authenticate { user_id }).to_json() {
                    Ok(text) => {
                        let _ = tx.send(text);
                    }
                    Err(e) => warn!("Failed to encode authenticate message: {}", e),
                }
            }
            control.outbound = Some(tx);
            self.state_tx.send_replace(ConnectionState::Open);
        }
        info!(generation, "Live channel open");

        let hooks: Vec<OpenHook> = self
            .open_hooks
            .lock()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for hook in hooks {
            hook();
        }
        self.dispatcher.emit(&ClientEvent::Connected);

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    if let Err(e) = sink.close().await {
                        debug!("Error closing transport: {}", e);
                    }
                    return ServeExit::Shutdown;
                }
                Some(text) = rx.recv() => {
                    if let Err(e) = sink.send(text).await {
                        return ServeExit::Dropped(e.to_string());
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => return ServeExit::Dropped(e.to_string()),
                    None => return ServeExit::Dropped("stream ended".to_string()),
                },
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        match ServerFrame::from_json(text) {
            Ok(frame) => {
                debug!(kind = frame.event.kind(), "Inbound frame");
                self.dispatcher.emit(&ClientEvent::Server(frame));
            }
            Err(ProtocolError::UnknownType(kind)) => {
                warn!(kind = %kind, "Ignoring frame with unknown type");
            }
            Err(e) => {
                warn!(error = e.label(), "Dropping malformed frame: {}", e);
            }
        }
    }
}
