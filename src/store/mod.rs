//! Shared job store adapter
//!
//! All queue, job, and aggregation access goes through the [`JobStore`]
//! trait so the processor and the API are independent of the backend.
//! [`RedisStore`] talks to the shared Redis instance; [`MemoryStore`] backs
//! the test suite and local development.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::job::{Aggregation, Job, JobState};

/// Key prefix for aggregation records.
pub const AGGR_KEY_PREFIX: &str = "aggr:";
/// Key prefix for job records.
pub const JOB_KEY_PREFIX: &str = "job:";
/// Key prefix for per-aggregation pending queues.
pub const QUEUE_KEY_PREFIX: &str = "queue:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("aggregation not found: {0}")]
    AggregationNotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Capability set over the shared key-value backend.
///
/// Write operations are fail-fast: backend errors are returned verbatim and
/// the caller decides whether to retry.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn job_exists(&self, id: &str) -> Result<bool>;

    async fn save_job(&self, job: &Job) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Job>;

    /// Load the job, update its state (and `meta`, when given), save it back.
    async fn set_job_state(
        &self,
        id: &str,
        state: JobState,
        meta: Option<&str>,
    ) -> Result<()>;

    /// Persist the job record and tail-push its ID onto the aggregation's
    /// pending queue.
    async fn queue_pending_job(&self, job: &Job) -> Result<()>;

    /// Pop the oldest pending job for the aggregation.
    ///
    /// `Ok(None)` means the queue is empty, a normal outcome rather than an
    /// error. A popped ID whose job record is missing is logged and skipped.
    async fn pop_pending_job(&self, aggr_id: &str) -> Result<Option<Job>>;

    async fn aggregation_exists(&self, id: &str) -> Result<bool>;

    async fn save_aggregation(&self, aggr: &Aggregation) -> Result<()>;

    async fn get_aggregation(&self, id: &str) -> Result<Aggregation>;

    /// Cursored enumeration of aggregation IDs.
    ///
    /// A returned cursor of 0 completes one full pass. IDs may be observed
    /// more than once across passes; callers must tolerate re-observation.
    async fn scan_aggregation_ids(
        &self,
        cursor: u64,
        batch: usize,
    ) -> Result<(Vec<String>, u64)>;
}
