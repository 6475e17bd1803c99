//! Download processor
//!
//! The supervisor keeps the pool registry in correspondence with the
//! aggregations present in the store: a periodic cursored scan spawns a
//! worker pool for every unseen aggregation, a close channel reaps pools as
//! they terminate, and shutdown drains the registry before returning.

mod pool;

pub use pool::WorkerPool;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProcessorConfig;
use crate::fetcher::Fetcher;
use crate::job::Aggregation;
use crate::observability::Metrics;
use crate::store::{JobStore, Result as StoreResult};

/// Batch size for the cursored aggregation scan.
pub const SCAN_BATCH: usize = 50;

pub struct Processor {
    storage_dir: PathBuf,
    scan_interval: Duration,
    poll_interval: Duration,
    store: Arc<dyn JobStore>,
    fetcher: Arc<Fetcher>,
    metrics: Arc<Metrics>,
    /// Registry of live pools, owned exclusively by the supervisor task.
    pools: HashMap<String, Arc<WorkerPool>>,
}

impl Processor {
    pub fn new(
        config: &ProcessorConfig,
        store: Arc<dyn JobStore>,
        fetcher: Arc<Fetcher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            storage_dir: config.storage_dir.clone(),
            scan_interval: config.scan_interval(),
            poll_interval: config.poll_interval(),
            store,
            fetcher,
            metrics,
            pools: HashMap::new(),
        }
    }

    /// Supervisor loop. Returning is the shutdown ack: by then every pool
    /// has been reaped and no fetch is in flight.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("processor started");

        let (pool_close_tx, mut pool_close_rx) = mpsc::channel::<String>(16);
        let pools_token = shutdown.child_token();

        let mut scan_tick = tokio::time::interval(self.scan_interval);
        scan_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut draining = false;

        loop {
            tokio::select! {
                Some(aggr_id) = pool_close_rx.recv() => {
                    debug!(aggr = %aggr_id, "reaping worker pool");
                    self.pools.remove(&aggr_id);
                    self.metrics.pool_reaped();
                    if draining && self.pools.is_empty() {
                        break;
                    }
                }
                _ = shutdown.cancelled(), if !draining => {
                    info!(pools = self.pools.len(), "shutdown requested, draining worker pools");
                    draining = true;
                    if self.pools.is_empty() {
                        break;
                    }
                }
                _ = scan_tick.tick(), if !draining => {
                    if let Err(err) = self.scan_aggregations(&pools_token, &pool_close_tx).await {
                        warn!(%err, "aggregation scan failed");
                    }
                }
            }
        }

        info!("processor closed");
    }

    /// One full cursored pass over the aggregation keyspace, spawning pools
    /// for unseen IDs. Re-observed IDs are ignored, so duplicate delivery
    /// across scan passes is harmless.
    async fn scan_aggregations(
        &mut self,
        token: &CancellationToken,
        close_tx: &mpsc::Sender<String>,
    ) -> StoreResult<()> {
        let mut cursor = 0u64;
        loop {
            let (ids, next) = self.store.scan_aggregation_ids(cursor, SCAN_BATCH).await?;
            for id in ids {
                if self.pools.contains_key(&id) {
                    continue;
                }
                let aggr = match self.store.get_aggregation(&id).await {
                    Ok(aggr) => aggr,
                    Err(err) => {
                        warn!(aggr = %id, %err, "could not load aggregation");
                        continue;
                    }
                };
                self.spawn_pool(aggr, token, close_tx);
            }
            cursor = next;
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    fn spawn_pool(
        &mut self,
        aggr: Aggregation,
        token: &CancellationToken,
        close_tx: &mpsc::Sender<String>,
    ) {
        info!(aggr = %aggr.id, limit = aggr.limit, "spawning worker pool");
        let pool = Arc::new(WorkerPool::new(
            aggr.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.fetcher),
            self.storage_dir.clone(),
            self.poll_interval,
            Arc::clone(&self.metrics),
        ));
        self.pools.insert(aggr.id.clone(), Arc::clone(&pool));
        self.metrics.pool_spawned();

        let pool_token = token.child_token();
        let close_tx = close_tx.clone();
        tokio::spawn(async move {
            let aggr_id = pool.aggregation_id().to_string();
            pool.run(pool_token).await;
            let _ = close_tx.send(aggr_id).await;
        });
    }
}
