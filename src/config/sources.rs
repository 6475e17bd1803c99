use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "FETCHPOOL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/fetchpool.toml";
const ENV_PREFIX: &str = "FETCHPOOL";
const ENV_SEPARATOR: &str = "__";

/// Load configuration, lowest priority first: struct defaults, the TOML
/// file, `.env` (via dotenvy), then process environment variables.
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific file path plus the environment.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    if config_path.exists() {
        tracing::info!("loading configuration from {}", config_path.display());
    } else {
        tracing::warn!(
            "no configuration file at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // FETCHPOOL__PROCESSOR__STORAGE_DIR -> processor.storage_dir
    config::Config::builder()
        .add_source(File::from(config_path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_defaults_when_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_from_sources(temp_dir.path().join("nonexistent.toml")).unwrap();

        assert_eq!(config.redis.addr, "redis://127.0.0.1:6379");
        assert_eq!(config.processor.scan_interval_ms, 2000);
    }

    #[test]
    fn load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(
            &config_path,
            r#"
[redis]
addr = "redis://store.internal:6380"

[api]
bind_addr = "127.0.0.1:9000"
heartbeat_path = "/var/run/fetchpool.down"

[processor]
storage_dir = "/srv/downloads"
poll_interval_ms = 250

[notifier]
concurrency = 8
            "#,
        )
        .unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.redis.addr, "redis://store.internal:6380");
        assert_eq!(config.api.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(
            config.processor.storage_dir.display().to_string(),
            "/srv/downloads"
        );
        assert_eq!(config.processor.poll_interval_ms, 250);
        // Unset keys keep their defaults.
        assert_eq!(config.processor.request_timeout_ms, 3000);
        assert_eq!(config.notifier.concurrency, 8);
    }

    // Environment-override tests are omitted: env::set_var is unsafe under
    // the parallel test runner.
}
