/// Push subscription registration
use super::ApiResponse;
use crate::error::AppError;
use crate::services::NotificationService;
use actix_web::{web, HttpResponse, Result as ActixResult};
use event_schema::PushSubscription;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSubscriptionPayload {
    pub user_id: Uuid,
    pub subscription: PushSubscription,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSubscriptionPayload {
    pub user_id: Uuid,
    pub endpoint: String,
}

/// Store a browser push subscription for a user
///
/// POST /api/v1/push/subscriptions
pub async fn register_subscription(
    service: web::Data<Arc<NotificationService>>,
    req: web::Json<RegisterSubscriptionPayload>,
) -> ActixResult<HttpResponse> {
    let RegisterSubscriptionPayload {
        user_id,
        subscription,
    } = req.into_inner();

    if subscription.endpoint.trim().is_empty() {
        return Err(AppError::BadRequest("subscription endpoint is empty".into()).into());
    }

    service.subscriptions().save(user_id, subscription).await;
    Ok(HttpResponse::Created().json(ApiResponse::ok(serde_json::json!({
        "userId": user_id,
        "success": true
    }))))
}

/// Remove a push subscription by endpoint
///
/// DELETE /api/v1/push/subscriptions
pub async fn remove_subscription(
    service: web::Data<Arc<NotificationService>>,
    req: web::Json<RemoveSubscriptionPayload>,
) -> ActixResult<HttpResponse> {
    if service
        .subscriptions()
        .remove(req.user_id, &req.endpoint)
        .await
    {
        Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "success": true }))))
    } else {
        Err(AppError::NotFound(format!("no subscription for endpoint {}", req.endpoint)).into())
    }
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/v1/push/subscriptions")
            .route(web::post().to(register_subscription))
            .route(web::delete().to(remove_subscription)),
    );
}
