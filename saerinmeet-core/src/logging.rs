//! Structured logging setup

use std::sync::Arc;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Dependencies that are chatty at debug level
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "hyper=warn", "reqwest=warn", "opendal=info"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(format: &str) -> anyhow::Result<Self> {
        match format.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!("Invalid log format: {other}")),
        }
    }
}

/// Initialize logging from configuration.
///
/// `RUST_LOG` replaces the configured level entirely when set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let format = LogFormat::parse(&config.format)?;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.level)?)?,
    };

    let writer = match &config.file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open log file {path}: {e}"))?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .with_writer(writer),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_span_events(FmtSpan::NONE)
                    .with_target(true)
                    .with_line_number(true)
                    .with_ansi(config.file_path.is_none())
                    .with_writer(writer),
            )
            .try_init()?,
    }

    Ok(())
}

/// Configured level for everything, with noisy dependencies held down
fn default_directives(level: &str) -> anyhow::Result<String> {
    let level = match level.to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        l @ ("trace" | "debug" | "info" | "warn" | "error") => l.to_string(),
        _ => return Err(anyhow::anyhow!("Invalid log level: {level}")),
    };

    let mut directives = vec![level];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| (*d).to_string()));
    Ok(directives.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let directives = default_directives("DEBUG").unwrap();
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("sqlx=warn"));

        assert!(default_directives("warning").unwrap().starts_with("warn,"));
        assert!(default_directives("verbose").is_err());
    }

    #[test]
    fn test_log_format() {
        assert_eq!(LogFormat::parse("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("Pretty").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::parse("xml").is_err());
    }
}
