use actix_web::{middleware, web, App, HttpServer};
use notification_service::{
    handlers::{register_events, register_push_subscriptions, register_websocket},
    metrics,
    services::{InMemorySubscriptionStore, SmtpEmailChannel},
    Config, NotificationService, SessionHub,
};
use push_delivery::{PushDeliveryService, WebPushGatewayConfig, WebPushGatewayProvider};
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting notification service");

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let mut push = PushDeliveryService::new(config.push.vapid_public_key.clone())
        .with_send_timeout(config.push.send_timeout());
    match &config.push.gateway_url {
        Some(url) => {
            let mut gateway = WebPushGatewayConfig::new(url.clone());
            gateway.ttl_secs = config.push.ttl_secs;
            if let Some(key) = &config.push.api_key {
                gateway = gateway.with_api_key(key.clone());
            }
            push = push.with_provider(Arc::new(WebPushGatewayProvider::new(gateway)));
            tracing::info!("Push gateway configured at {}", url);
        }
        None => {
            tracing::warn!("PUSH_GATEWAY_URL not set; push delivery disabled, email fallback only");
        }
    }

    if config.is_production() && config.smtp.host.trim().is_empty() {
        tracing::warn!("SMTP_HOST not set in production; email fallback will only log");
    }
    let email = SmtpEmailChannel::new(&config.smtp)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let hub = Arc::new(SessionHub::new());
    let notification_service = Arc::new(NotificationService::new(
        hub.clone(),
        Arc::new(push),
        Arc::new(InMemorySubscriptionStore::new()),
        Arc::new(email),
    ));

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!(env = %config.app.env, "Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(notification_service.clone()))
            .app_data(web::Data::new(hub.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::HttpMetrics)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(|cfg| {
                register_events(cfg);
                register_push_subscriptions(cfg);
                register_websocket(cfg);
            })
    })
    .bind(&addr)?
    .run()
    .await
}
