//! Configuration management
//!
//! Layered loading in the order: struct defaults, TOML file, `.env`,
//! process environment (highest priority). The default file is
//! `config/fetchpool.toml`, overridable with the `FETCHPOOL_CONFIG`
//! environment variable; individual keys are overridable as
//! `FETCHPOOL__<SECTION>__<KEY>` (e.g. `FETCHPOOL__REDIS__ADDR`).

mod models;
mod sources;
mod validation;

pub use models::{ApiConfig, Config, NotifierConfig, ProcessorConfig, RedisConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, for tests and the
    /// `--config` CLI flag.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
