//! Database initialization

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::Config;

/// Connect the PostgreSQL pool. Migrations are run by the binary.
pub async fn init_database(config: &Config) -> Result<PgPool> {
    let target = redact_url(config.database_url());
    info!(
        database = %target,
        max_connections = config.database.max_connections,
        "Connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(config.database_url())
        .await
        .map_err(|e| {
            error!(database = %target, "Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection to {target} failed: {e}")
        })?;

    info!("Database connected successfully");
    Ok(pool)
}

/// Drop the password from a connection URL before it is logged
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}
