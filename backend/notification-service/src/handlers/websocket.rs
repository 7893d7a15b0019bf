/// Live channel endpoints
use actix_web::{web, Error, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use futures::channel::mpsc;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::websocket::{SessionHub, WsSession};

/// Upgrade to a live session
///
/// Endpoint: GET /ws
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    hub: web::Data<Arc<SessionHub>>,
) -> Result<HttpResponse, Error> {
    let (tx, rx) = mpsc::unbounded();
    let session_id = hub.register(tx);

    match ws::start(WsSession::new(session_id, hub.get_ref().clone(), rx), &req, stream) {
        Ok(response) => Ok(response),
        Err(e) => {
            warn!(%session_id, "WebSocket upgrade failed: {}", e);
            hub.remove(session_id);
            Err(e)
        }
    }
}

/// Get connection metrics
///
/// Endpoint: GET /api/v1/ws/metrics
pub async fn ws_metrics(hub: web::Data<Arc<SessionHub>>) -> ActixResult<HttpResponse> {
    let total_sessions = hub.session_count();
    let connected_users = hub.connected_users();

    Ok(HttpResponse::Ok().json(json!({
        "total_sessions": total_sessions,
        "connected_users": connected_users,
        "active_topics": hub.topic_count(),
        "average_sessions_per_user": if connected_users > 0 {
            total_sessions as f64 / connected_users as f64
        } else {
            0.0
        }
    })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_connect))
        .route("/api/v1/ws/metrics", web::get().to(ws_metrics));
}
