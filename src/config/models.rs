use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Shared store backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_addr")]
    pub addr: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: default_redis_addr(),
        }
    }
}

fn default_redis_addr() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Ingress API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Heartbeat sentinel: while this file exists, `GET /hb` reports the
    /// service as disabled.
    #[serde(default = "default_heartbeat_path")]
    pub heartbeat_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            heartbeat_path: default_heartbeat_path(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8000".parse().unwrap()
}

fn default_heartbeat_path() -> PathBuf {
    PathBuf::from("tmp/maintenance")
}

/// Download processor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Period of the aggregation discovery scan.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// Back-off between empty-queue polls inside a worker pool.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wall-clock budget for a single download request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ProcessorConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            scan_interval_ms: default_scan_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("data/downloads")
}

fn default_scan_interval_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_user_agent() -> String {
    format!("fetchpool/{}", env!("CARGO_PKG_VERSION"))
}

/// Completion notifier (external service; recognized, unused by the core)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_concurrency")]
    pub concurrency: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            concurrency: default_notifier_concurrency(),
        }
    }
}

fn default_notifier_concurrency() -> usize {
    4
}
