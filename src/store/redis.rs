//! Redis-backed implementation of the job store.
//!
//! Key namespace: `aggr:<id>` for aggregation records, `job:<id>` for job
//! records, `queue:<aggrID>` for pending-job ID lists. Records are JSON.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};

use super::{
    JobStore, Result, StoreError, AGGR_KEY_PREFIX, JOB_KEY_PREFIX, QUEUE_KEY_PREFIX,
};
use crate::job::{Aggregation, Job, JobState};

/// Job store over a shared Redis instance.
///
/// `ConnectionManager` multiplexes and reconnects under the hood, so the
/// store is cheap to clone and share across tasks.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the backend at `addr` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(addr: &str) -> Result<Self> {
        let client = redis::Client::open(addr)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to job store backend");
        Ok(Self { conn })
    }

    fn job_key(id: &str) -> String {
        format!("{JOB_KEY_PREFIX}{id}")
    }

    fn aggr_key(id: &str) -> String {
        format!("{AGGR_KEY_PREFIX}{id}")
    }

    fn queue_key(aggr_id: &str) -> String {
        format!("{QUEUE_KEY_PREFIX}{aggr_id}")
    }
}

/// Strips the aggregation key prefix from a scanned key. Keys not carrying
/// the prefix are returned unchanged.
pub(super) fn strip_aggr_prefix(key: &str) -> &str {
    key.strip_prefix(AGGR_KEY_PREFIX).unwrap_or(key)
}

#[async_trait::async_trait]
impl JobStore for RedisStore {
    async fn job_exists(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::job_key(id)).await?;
        Ok(exists)
    }

    async fn save_job(&self, job: &Job) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(job)?;
        let _: () = conn.set(Self::job_key(&job.id), payload).await?;
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::job_key(id)).await?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(StoreError::JobNotFound(id.to_string())),
        }
    }

    async fn set_job_state(
        &self,
        id: &str,
        state: JobState,
        meta: Option<&str>,
    ) -> Result<()> {
        let mut job = self.get_job(id).await?;
        job.state = state;
        if let Some(meta) = meta {
            job.meta = meta.to_string();
        }
        self.save_job(&job).await
    }

    async fn queue_pending_job(&self, job: &Job) -> Result<()> {
        self.save_job(job).await?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .rpush(Self::queue_key(&job.aggr_id), &job.id)
            .await?;
        Ok(())
    }

    async fn pop_pending_job(&self, aggr_id: &str) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();
        loop {
            let id: Option<String> = conn.lpop(Self::queue_key(aggr_id), None).await?;
            let Some(id) = id else {
                return Ok(None);
            };
            match self.get_job(&id).await {
                Ok(job) => return Ok(Some(job)),
                // Queued ID without a record: data inconsistency, skip it
                // rather than wedging the whole queue.
                Err(StoreError::JobNotFound(_)) => {
                    warn!(job = %id, aggr = %aggr_id, "queued job has no record, skipping");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn aggregation_exists(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::aggr_key(id)).await?;
        Ok(exists)
    }

    async fn save_aggregation(&self, aggr: &Aggregation) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(aggr)?;
        let _: () = conn.set(Self::aggr_key(&aggr.id), payload).await?;
        Ok(())
    }

    async fn get_aggregation(&self, id: &str) -> Result<Aggregation> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::aggr_key(id)).await?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(StoreError::AggregationNotFound(id.to_string())),
        }
    }

    async fn scan_aggregation_ids(
        &self,
        cursor: u64,
        batch: usize,
    ) -> Result<(Vec<String>, u64)> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{AGGR_KEY_PREFIX}*"))
            .arg("COUNT")
            .arg(batch)
            .query_async(&mut conn)
            .await?;

        let ids = keys
            .iter()
            .map(|key| strip_aggr_prefix(key).to_string())
            .collect();
        Ok((ids, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding() {
        assert_eq!(RedisStore::job_key("j1"), "job:j1");
        assert_eq!(RedisStore::aggr_key("a1"), "aggr:a1");
        assert_eq!(RedisStore::queue_key("a1"), "queue:a1");
    }

    #[test]
    fn aggr_prefix_stripping() {
        assert_eq!(strip_aggr_prefix("aggr:tenant-7"), "tenant-7");
        assert_eq!(strip_aggr_prefix("tenant-7"), "tenant-7");
    }
}
