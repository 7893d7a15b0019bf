use std::rc::Rc;
use std::time::{Duration, Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, TextEncoder,
};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_http_requests_total",
            "Total HTTP requests handled by notification-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create notification_service_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "notification_service_http_request_duration_seconds",
            "HTTP request latency for notification-service",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "path", "status"],
    )
    .expect("failed to create notification_service_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register notification_service_http_request_duration_seconds");
    histogram
});

static LIVE_FRAMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_live_frames_total",
            "Server events written to subscribed live sessions",
        ),
        &["type"],
    )
    .expect("failed to create notification_service_live_frames_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_live_frames_total");
    counter
});

static PUSH_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_push_deliveries_total",
            "Push deliveries by outcome (success, failure, stale)",
        ),
        &["outcome"],
    )
    .expect("failed to create notification_service_push_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_push_deliveries_total");
    counter
});

static EMAIL_FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_email_fallbacks_total",
            "Email fallbacks for recipients not reachable live or by push",
        ),
        &["outcome"],
    )
    .expect("failed to create notification_service_email_fallbacks_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_email_fallbacks_total");
    counter
});

static DROPPED_FRAMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_dropped_frames_total",
            "Inbound client frames dropped as malformed or unknown",
        ),
        &["reason"],
    )
    .expect("failed to create notification_service_dropped_frames_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_dropped_frames_total");
    counter
});

static CONNECTED_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "notification_service_connected_sessions",
        "Live WebSocket sessions currently registered",
    )
    .expect("failed to create notification_service_connected_sessions");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register notification_service_connected_sessions");
    gauge
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn record_live_frames(event_type: &str, sessions: usize) {
    LIVE_FRAMES_TOTAL
        .with_label_values(&[event_type])
        .inc_by(sessions as u64);
}

pub fn record_push(outcome: &str) {
    PUSH_DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_email(outcome: &str) {
    EMAIL_FALLBACKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_dropped_frame(reason: &str) {
    DROPPED_FRAMES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn set_connected_sessions(count: usize) {
    CONNECTED_SESSIONS.set(count as i64);
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

/// Times every request and records it under its matched route pattern
///
/// Unrouted requests share the `unmatched` label.
pub struct HttpMetrics;

impl<S, B> Transform<S, ServiceRequest> for HttpMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = HttpMetricsService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, inner: S) -> Self::Future {
        ready(Ok(HttpMetricsService {
            inner: Rc::new(inner),
        }))
    }
}

pub struct HttpMetricsService<S> {
    inner: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HttpMetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let inner = self.inner.clone();
        let route = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        let method = req.method().as_str().to_owned();
        let started = Instant::now();

        Box::pin(async move {
            let result = inner.call(req).await;
            let status = result
                .as_ref()
                .map(|res| res.status().as_u16())
                .unwrap_or(500);
            observe_http_request(&method, &route, status, started.elapsed());
            result
        })
    }
}
