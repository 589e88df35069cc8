use std::sync::Arc;
use std::time::Duration;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method, StatusCode,
};
use axum::{
    body::Body,
    extract::State,
    middleware,
    routing::{delete, get, post},
    Router,
};
use common_observability::BookingMetrics;
use prometheus::{Encoder, TextEncoder};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::booking_handlers::{cancel_booking, create_booking, list_bookings};
use crate::event_handlers::get_availability;
use crate::notifier::TicketFeed;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub feed: TicketFeed,
    pub metrics: Arc<BookingMetrics>,
    /// Bound on waiting for the event row lock; expiry surfaces as 503.
    pub lock_wait_timeout: Duration,
    /// Stress hook: hold the row lock this long inside the reservation
    /// transaction to widen the race window under test. Zero in production.
    pub reserve_hold_delay: Duration,
}

pub async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (StatusCode::OK, String::from_utf8_lossy(&buf).to_string())
}

async fn http_error_metrics(
    State(metrics): State<Arc<BookingMetrics>>,
    req: axum::http::Request<Body>,
    next: middleware::Next,
) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics
            .http_errors_total
            .with_label_values(&["booking-service", code, status.as_str()])
            .inc();
    }
    resp
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins = [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:5173",
    ];
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
        ]);

    let metrics = state.metrics.clone();
    Router::new()
        .route("/healthz", get(health))
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/:booking_id", delete(cancel_booking))
        .route("/events/:event_id/availability", get(get_availability))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .layer(middleware::from_fn_with_state(metrics, http_error_metrics))
        .layer(cors)
}
