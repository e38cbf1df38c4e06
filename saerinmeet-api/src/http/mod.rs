// Module: http
// HTTP/JSON REST API for the recording lifecycle

pub mod error;
pub mod health;
pub mod middleware;
pub mod recordings;
pub mod webhook;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use saerinmeet_core::{
    egress::WebhookVerifier,
    service::{JwtService, RecordingService},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recording_service: Arc<RecordingService>,
    pub jwt_service: JwtService,
    /// `None` when webhook signature checks are disabled
    pub webhook_verifier: Option<WebhookVerifier>,
}

/// Create the HTTP router with all routes
pub fn create_router(
    recording_service: Arc<RecordingService>,
    jwt_service: JwtService,
    webhook_verifier: Option<WebhookVerifier>,
    cors_origin: &str,
) -> Router {
    let state = AppState {
        recording_service,
        jwt_service,
        webhook_verifier,
    };

    Router::new()
        // Health check and metrics
        .merge(health::create_health_router())
        .merge(create_recording_router())
        .layer(axum::middleware::from_fn(crate::observability::metrics_layer))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn create_recording_router() -> Router<AppState> {
    Router::new()
        .route("/api/recordings", get(recordings::list_recordings))
        .route("/api/recordings/start", post(recordings::start_recording))
        .route("/api/recordings/stop", post(recordings::stop_recording))
        // Signed by the conferencing service, not by a user token
        .route("/api/recordings/webhook", post(webhook::receive_webhook))
        .route(
            "/api/recordings/meeting/{meeting_id}",
            get(recordings::meeting_recordings),
        )
        .route(
            "/api/recordings/download/{id}",
            get(recordings::download_recording),
        )
        .route("/api/recordings/watch/{id}", get(recordings::watch_recording))
        .route("/api/recordings/{id}/status", get(recordings::recording_status))
        .route(
            "/api/recordings/{id}",
            get(recordings::get_recording).delete(recordings::delete_recording),
        )
}

/// Allow the configured frontend origin, or any origin when unset
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origin.is_empty() || origin == "*" {
        return layer.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!("Invalid CORS origin {:?}, allowing any: {}", origin, e);
            layer.allow_origin(Any)
        }
    }
}
