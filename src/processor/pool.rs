//! Per-aggregation worker pool.
//!
//! One pool owns one aggregation's pending queue. The scheduling loop pops
//! jobs, marks them in-progress, and hands them to lazily-spawned workers
//! over a bounded channel; workers fetch and apply the retry policy. The
//! pool never exceeds the aggregation's concurrency limit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fetcher::{FetchOutcome, Fetcher};
use crate::job::{Aggregation, Job, JobState};
use crate::observability::Metrics;
use crate::store::JobStore;

pub struct WorkerPool {
    aggr: Aggregation,
    store: Arc<dyn JobStore>,
    fetcher: Arc<Fetcher>,
    storage_dir: PathBuf,
    poll_interval: Duration,
    active_workers: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
}

impl WorkerPool {
    pub fn new(
        mut aggr: Aggregation,
        store: Arc<dyn JobStore>,
        fetcher: Arc<Fetcher>,
        storage_dir: PathBuf,
        poll_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        // A zero limit would leave jobs stranded in the hand-off channel.
        aggr.limit = aggr.limit.max(1);
        Self {
            aggr,
            store,
            fetcher,
            storage_dir,
            poll_interval,
            active_workers: Arc::new(AtomicUsize::new(0)),
            metrics,
        }
    }

    pub fn aggregation_id(&self) -> &str {
        &self.aggr.id
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Scheduling loop. Returns once cancelled and all workers have drained.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(aggr = %self.aggr.id, limit = self.aggr.limit, "worker pool started");

        // Bounded hand-off channel: backpressure against popping faster than
        // the workers can fetch. The sender stays owned by this loop, so no
        // send can ever follow the close below.
        let (job_tx, job_rx) = async_channel::bounded::<Job>(1);
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        loop {
            if token.is_cancelled() {
                break;
            }

            let popped = tokio::select! {
                _ = token.cancelled() => break,
                popped = self.store.pop_pending_job(&self.aggr.id) => popped,
            };

            let job = match popped {
                Ok(Some(job)) => job,
                Ok(None) => {
                    // Queue drained; back off before polling again.
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                    continue;
                }
                Err(err) => {
                    warn!(aggr = %self.aggr.id, %err, "queue pop failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                    continue;
                }
            };

            // Record the hand-off before the fetch begins so the job is
            // observable as in-flight. A store error here is logged; the job
            // is already popped and will still be processed.
            if let Err(err) = self
                .store
                .set_job_state(&job.id, JobState::InProgress, None)
                .await
            {
                warn!(job = %job.id, %err, "could not mark job in progress");
            }

            if self.active_workers() < self.aggr.limit {
                self.active_workers.fetch_add(1, Ordering::SeqCst);
                let pool = Arc::clone(&self);
                let rx = job_rx.clone();
                let worker_token = token.clone();
                workers.push(tokio::spawn(async move {
                    pool.work(rx, worker_token).await;
                    pool.active_workers.fetch_sub(1, Ordering::SeqCst);
                }));
            }

            tokio::select! {
                // A job caught here stays InProgress; see the shutdown notes
                // in DESIGN.md.
                _ = token.cancelled() => break,
                sent = job_tx.send(job) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        // Stop accepting work; workers drain whatever is still buffered.
        job_tx.close();
        for worker in workers {
            let _ = worker.await;
        }
        info!(aggr = %self.aggr.id, "worker pool closed");
    }

    /// Worker loop: consume jobs until the channel closes.
    async fn work(&self, jobs: async_channel::Receiver<Job>, token: CancellationToken) {
        while let Ok(mut job) = jobs.recv().await {
            let dest = self.storage_dir.join(&job.id);
            let outcome = self.fetcher.fetch(&job.url, &dest, &token).await;
            match outcome {
                FetchOutcome::Success => {
                    job.state = JobState::Success;
                    job.download_path = dest.display().to_string();
                    job.meta.clear();
                    if let Err(err) = self.store.save_job(&job).await {
                        warn!(job = %job.id, %err, "could not record success");
                    }
                    self.metrics.job_succeeded();
                }
                FetchOutcome::Permanent(reason) => {
                    self.fail(&mut job, reason).await;
                }
                FetchOutcome::Transient(reason) => {
                    self.retry_or_fail(&mut job, reason).await;
                }
                FetchOutcome::Cancelled => {
                    // Not a terminal outcome: the job stays InProgress.
                    debug!(job = %job.id, "fetch aborted by shutdown");
                }
            }
        }
    }

    /// Requeue the job with an incremented retry counter, or terminalize it
    /// once the retry budget is spent.
    async fn retry_or_fail(&self, job: &mut Job, reason: String) {
        if !job.can_retry() {
            self.fail(job, reason).await;
            return;
        }

        job.retries += 1;
        job.meta = reason;
        job.state = JobState::Pending;
        debug!(job = %job.id, retries = job.retries, meta = %job.meta, "requeueing job");
        // Tail push: a persistently failing job must not starve fresh work.
        if let Err(err) = self.store.queue_pending_job(job).await {
            warn!(job = %job.id, %err, "could not requeue job");
            return;
        }
        self.metrics.job_retried();
    }

    async fn fail(&self, job: &mut Job, reason: String) {
        job.state = JobState::Failed;
        job.meta = reason;
        info!(job = %job.id, meta = %job.meta, "job failed");
        if let Err(err) = self.store.save_job(job).await {
            warn!(job = %job.id, %err, "could not record failure");
        }
        self.metrics.job_failed();
    }
}
