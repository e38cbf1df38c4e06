//! Configuration loading

use anyhow::Result;
use tracing::info;

use crate::Config;

/// Load configuration from config file or environment variables
///
/// Config file search order:
/// 1. SAERINMEET_CONFIG_PATH environment variable (explicit path)
/// 2. ./config.yaml (current working directory)
/// 3. /config/config.yaml (Kubernetes mount path)
/// 4. Fall back to environment variables only
pub fn load_config() -> Result<Config> {
    let config_path = std::env::var("SAERINMEET_CONFIG_PATH")
        .ok()
        .filter(|p| std::path::Path::new(p).exists())
        .or_else(|| {
            ["config.yaml", "/config/config.yaml"]
                .into_iter()
                .find(|p| std::path::Path::new(p).exists())
                .map(str::to_string)
        });

    // Logging is not up yet, so report through stderr
    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        Config::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?
    };

    // Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    info!("Configuration loaded and validated successfully");
    Ok(config)
}
