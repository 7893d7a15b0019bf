/// Domain event ingestion from the booking-state collaborator
use super::ApiResponse;
use crate::models::EventDelivery;
use crate::services::NotificationService;
use actix_web::{web, HttpResponse, Result as ActixResult};
use std::sync::Arc;

/// Dispatch one domain event
///
/// POST /api/v1/events
pub async fn ingest_event(
    service: web::Data<Arc<NotificationService>>,
    req: web::Json<EventDelivery>,
) -> ActixResult<HttpResponse> {
    let report = service.dispatch(&req).await;
    Ok(HttpResponse::Accepted().json(ApiResponse::ok(report)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/events", web::post().to(ingest_event));
}
