//! Composition root: wires the store, the processor, and the ingress API
//! together and orchestrates graceful shutdown.
//!
//! One cancellation token is the root of the shutdown tree: the signal
//! handler cancels it, the API drains its connections, the processor drains
//! its worker pools, and the process exits once the processor task has
//! acked by completing.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::observability::Metrics;
use crate::processor::Processor;
use crate::store::{JobStore, RedisStore};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(config_path: Option<PathBuf>) -> Result<(), AnyError> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    tokio::fs::create_dir_all(&config.processor.storage_dir).await?;

    info!(addr = %config.redis.addr, "connecting to job store");
    let store: Arc<dyn JobStore> = Arc::new(RedisStore::connect(&config.redis.addr).await?);

    let metrics = Arc::new(Metrics::new());
    let fetcher = Arc::new(Fetcher::new(FetcherConfig {
        request_timeout: config.processor.request_timeout(),
        user_agent: config.processor.user_agent.clone(),
    })?);

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let processor = Processor::new(
        &config.processor,
        Arc::clone(&store),
        fetcher,
        Arc::clone(&metrics),
    );
    let processor_task = tokio::spawn(processor.run(shutdown.child_token()));

    let state = AppState::new(
        Arc::clone(&store),
        config.api.heartbeat_path.clone(),
        Arc::clone(&metrics),
    );
    let served = api::serve(config.api.bind_addr, state, shutdown.clone()).await;

    // Whatever stopped the API, make sure the processor drains before exit.
    shutdown.cancel();
    processor_task.await?;
    served?;

    info!("shutdown complete");
    Ok(())
}

/// Bridges process signals into the cancellation tree: the first SIGINT or
/// SIGTERM cancels the root token and everything downstream drains.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = interrupt => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(%err, "could not install SIGTERM handler, listening for Ctrl+C only");
            let _ = interrupt.await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
