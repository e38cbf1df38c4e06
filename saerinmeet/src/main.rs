mod server;

use anyhow::Result;
use tracing::{error, info, warn};

use saerinmeet_core::{
    bootstrap::{init_database, init_services, load_config},
    logging,
};

use server::SaerinMeetServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("SaerinMeet recording server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Initialize database
    let pool = init_database(&config).await?;

    // 4. Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            anyhow::anyhow!("Migration failed: {e}")
        })?;
    info!("Migrations completed");

    // 5. Initialize services
    let services = init_services(pool, &config)?;

    // 6. Pick up recordings a previous process left waiting for their file
    match services.recording_service.resume_pending_polls().await {
        Ok(count) => info!("Resumed {} pending completion poll(s)", count),
        // Non-fatal: the status endpoint still completes them on demand
        Err(e) => warn!("Failed to resume pending polls: {}", e),
    }

    // 7. Serve until shutdown
    SaerinMeetServer::new(config, services).start().await
}
