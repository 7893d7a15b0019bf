/// WebSocket session actor
///
/// One actor per client connection. Inbound text frames are control messages
/// applied to the hub; outbound frames arrive from the hub through the
/// session's channel and are written as text.
use super::manager::{SessionHub, SessionId};
use crate::metrics;
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use event_schema::{ControlMessage, ProtocolError};
use futures::channel::mpsc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Frame queued by the hub for this session
struct OutboundFrame(String);

pub struct WsSession {
    id: SessionId,
    hub: Arc<SessionHub>,
    outbound: Option<mpsc::UnboundedReceiver<String>>,
    hb: Instant,
}

impl WsSession {
    pub fn new(
        id: SessionId,
        hub: Arc<SessionHub>,
        outbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            id,
            hub,
            outbound: Some(outbound),
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!(session_id = %act.id, "WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&self, text: &str) {
        match ControlMessage::from_json(text) {
            Ok(message) => {
                debug!(session_id = %self.id, kind = message.kind(), "Control message");
                self.hub.apply_control(self.id, &message);
            }
            Err(ProtocolError::UnknownType(kind)) => {
                metrics::record_dropped_frame("unknown_type");
                warn!(session_id = %self.id, kind = %kind, "Ignoring unknown control message");
            }
            Err(e) => {
                metrics::record_dropped_frame(e.label());
                warn!(session_id = %self.id, "Dropping malformed control message: {}", e);
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session_id = %self.id, "WebSocket session started");
        self.hb(ctx);
        if let Some(outbound) = self.outbound.take() {
            ctx.add_stream(outbound.map(OutboundFrame));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(session_id = %self.id, "WebSocket session stopped");
        self.hub.remove(self.id);
    }
}

impl StreamHandler<OutboundFrame> for WsSession {
    fn handle(&mut self, frame: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(frame.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_text(&text);
            }
            Ok(ws::Message::Binary(_)) => {
                metrics::record_dropped_frame("binary");
                warn!(session_id = %self.id, "Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session_id = %self.id, "WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(session_id = %self.id, "WebSocket protocol error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}
