//! Engine configuration.
//!
//! A single flat TOML file with serde defaults; environment variables
//! override individual knobs. Loaded once at startup and passed explicitly
//! into the components that need it.

use crate::buffer::DEFAULT_BLOCK_SIZE;
use crate::error::SetupError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transfer block size in bytes for chunked blob/file streaming.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Worker threads in the task runner; 0 means available parallelism.
    #[serde(default)]
    pub worker_threads: usize,

    /// Default number of items revealed per `reveal_more` page.
    #[serde(default = "default_reveal_page")]
    pub reveal_page_size: usize,

    /// Thumbnail cache budget in bytes (approximate decoded size).
    #[serde(default = "default_thumb_cache_bytes")]
    pub thumb_cache_bytes: u64,

    /// Device density multiplier applied to requested thumbnail bounds.
    #[serde(default = "default_density")]
    pub density: f32,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_reveal_page() -> usize {
    32
}

fn default_thumb_cache_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_density() -> f32 {
    1.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            worker_threads: 0,
            reveal_page_size: default_reveal_page(),
            thumb_cache_bytes: default_thumb_cache_bytes(),
            density: default_density(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SetupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: EngineConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self, SetupError> {
        let mut config = EngineConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env("CABINET_BLOCK_SIZE") {
            self.block_size = v;
        }
        if let Some(v) = parse_env("CABINET_WORKER_THREADS") {
            self.worker_threads = v;
        }
        if let Some(v) = parse_env("CABINET_THUMB_CACHE_BYTES") {
            self.thumb_cache_bytes = v;
        }
        if let Some(v) = parse_env("CABINET_DENSITY") {
            self.density = v;
        }
    }

    fn validate(&self) -> Result<(), SetupError> {
        if self.block_size == 0 {
            return Err(SetupError::Config(
                "block_size must be greater than zero".to_string(),
            ));
        }
        if self.density <= 0.0 {
            return Err(SetupError::Config(
                "density must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective worker pool size.
    pub fn effective_workers(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
