//! Logging system.
//!
//! Structured logging via the `tracing` crate. Level, format and
//! destination come from [`LoggingConfig`] with `CABINET_LOG*` environment
//! overrides.

use crate::error::SetupError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text).
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stderr or file (default: stderr).
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is file; None means the platform default.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
        }
    }
}

/// Default log file path under the platform state directory.
pub fn default_log_file_path() -> Result<PathBuf, SetupError> {
    let project_dirs = directories::ProjectDirs::from("", "cabinet", "cabinet").ok_or_else(|| {
        SetupError::Config("could not determine platform state directory for log file".to_string())
    })?;
    let dir = project_dirs
        .state_dir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
    Ok(dir.join("cabinet.log"))
}

/// Initialize the logging system.
///
/// Environment overrides: `CABINET_LOG` (filter directives),
/// `CABINET_LOG_FORMAT`, `CABINET_LOG_OUTPUT`, `CABINET_LOG_FILE`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SetupError> {
    if !config.enabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = std::env::var("CABINET_LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let output = std::env::var("CABINET_LOG_OUTPUT").unwrap_or_else(|_| config.output.clone());

    let base = Registry::default().with(filter);

    match (format.as_str(), output.as_str()) {
        ("json", "file") => {
            let writer = open_log_file(config)?;
            base.with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init();
        }
        ("json", _) => {
            base.with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .init();
        }
        ("text", "file") => {
            let writer = open_log_file(config)?;
            base.with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init();
        }
        ("text", _) => {
            base.with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .init();
        }
        (other, _) => {
            return Err(SetupError::Config(format!(
                "invalid log format: {} (must be 'json' or 'text')",
                other
            )));
        }
    }

    Ok(())
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, SetupError> {
    let path = match std::env::var("CABINET_LOG_FILE") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => match &config.file {
            Some(p) => p.clone(),
            None => default_log_file_path()?,
        },
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SetupError::Config(format!("failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| SetupError::Config(format!("failed to open log file {:?}: {}", path, e)))
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, SetupError> {
    if let Ok(filter) = EnvFilter::try_from_env("CABINET_LOG") {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| SetupError::Config(format!("invalid log level directive: {}", e)))
}
