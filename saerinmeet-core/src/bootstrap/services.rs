//! Service initialization and dependency injection

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    egress::{EgressOptions, LiveKitEgressClient, WebhookVerifier},
    repository::{MeetingRepository, RecordingRepository},
    service::{JwtService, RecordingService},
    storage::OpendalStorage,
    Config,
};

/// Container for all initialized services
#[derive(Clone)]
pub struct Services {
    /// Recording lifecycle service
    pub recording_service: Arc<RecordingService>,
    /// JWT token service
    pub jwt_service: JwtService,
    /// Webhook signature check, `None` when verification is turned off
    pub webhook_verifier: Option<WebhookVerifier>,
}

/// Initialize all core services
pub fn init_services(pool: PgPool, config: &Config) -> Result<Services, anyhow::Error> {
    info!("Initializing services...");

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_duration_hours)?;
    info!("JWT service initialized");

    let storage = OpendalStorage::s3(&config.storage)
        .map_err(|e| anyhow::anyhow!("Failed to initialize object storage: {e}"))?;
    info!(bucket = %config.storage.bucket, endpoint = %config.storage.endpoint, "Object storage initialized");

    let egress = LiveKitEgressClient::new(&config.egress)?;
    info!(url = %config.egress.url, "Egress client initialized");

    let recording_service = RecordingService::new(
        Arc::new(RecordingRepository::new(pool.clone())),
        Arc::new(MeetingRepository::new(pool)),
        Arc::new(egress),
        Arc::new(storage),
        EgressOptions::from(&config.egress),
        config.recording.clone(),
    );
    info!(
        poll_interval_seconds = config.recording.poll_interval_seconds,
        max_poll_attempts = config.recording.max_poll_attempts,
        "RecordingService initialized"
    );

    let webhook_verifier = if config.egress.verify_webhooks {
        Some(WebhookVerifier::new(&config.egress.api_key, &config.egress.api_secret))
    } else {
        warn!("⚠ Webhook signature verification DISABLED, any caller can settle recordings");
        None
    };

    Ok(Services {
        recording_service: Arc::new(recording_service),
        jwt_service,
        webhook_verifier,
    })
}
