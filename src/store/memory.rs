//! In-memory job store for the test suite and local development.
//!
//! Mirrors the Redis contracts: tail-push/head-pop FIFO queues, a
//! distinguished empty-queue pop result, and a cursored aggregation scan
//! that may re-observe IDs across passes.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::warn;

use super::{JobStore, Result, StoreError};
use crate::job::{Aggregation, Job, JobState};

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    aggregations: HashMap<String, Aggregation>,
    queues: HashMap<String, VecDeque<String>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of IDs currently queued for the aggregation.
    pub fn queue_len(&self, aggr_id: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.queues.get(aggr_id).map(VecDeque::len).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryStore {
    async fn job_exists(&self, id: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.jobs.contains_key(id))
    }

    async fn save_job(&self, job: &Job) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        let inner = self.inner.lock().unwrap();
        inner
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))
    }

    async fn set_job_state(
        &self,
        id: &str,
        state: JobState,
        meta: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.state = state;
        if let Some(meta) = meta {
            job.meta = meta.to_string();
        }
        Ok(())
    }

    async fn queue_pending_job(&self, job: &Job) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.insert(job.id.clone(), job.clone());
        inner
            .queues
            .entry(job.aggr_id.clone())
            .or_default()
            .push_back(job.id.clone());
        Ok(())
    }

    async fn pop_pending_job(&self, aggr_id: &str) -> Result<Option<Job>> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let id = match inner.queues.get_mut(aggr_id).and_then(VecDeque::pop_front) {
                Some(id) => id,
                None => return Ok(None),
            };
            match inner.jobs.get(&id) {
                Some(job) => return Ok(Some(job.clone())),
                None => {
                    warn!(job = %id, aggr = %aggr_id, "queued job has no record, skipping");
                }
            }
        }
    }

    async fn aggregation_exists(&self, id: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.aggregations.contains_key(id))
    }

    async fn save_aggregation(&self, aggr: &Aggregation) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.aggregations.insert(aggr.id.clone(), aggr.clone());
        Ok(())
    }

    async fn get_aggregation(&self, id: &str) -> Result<Aggregation> {
        let inner = self.inner.lock().unwrap();
        inner
            .aggregations
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::AggregationNotFound(id.to_string()))
    }

    async fn scan_aggregation_ids(
        &self,
        cursor: u64,
        batch: usize,
    ) -> Result<(Vec<String>, u64)> {
        let inner = self.inner.lock().unwrap();
        // Sorted snapshot so pagination by index is stable within a pass.
        let mut all: Vec<String> = inner.aggregations.keys().cloned().collect();
        all.sort();

        let start = cursor as usize;
        if start >= all.len() {
            return Ok((Vec::new(), 0));
        }
        let end = (start + batch.max(1)).min(all.len());
        let ids = all[start..end].to_vec();
        let next = if end >= all.len() { 0 } else { end as u64 };
        Ok((ids, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, aggr: &str) -> Job {
        Job::new(id.into(), format!("http://example.com/{id}"), aggr.into())
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let store = MemoryStore::new();
        store.queue_pending_job(&job("j1", "a")).await.unwrap();
        store.queue_pending_job(&job("j2", "a")).await.unwrap();
        store.queue_pending_job(&job("j3", "a")).await.unwrap();

        let first = store.pop_pending_job("a").await.unwrap().unwrap();
        let second = store.pop_pending_job("a").await.unwrap().unwrap();
        assert_eq!(first.id, "j1");
        assert_eq!(second.id, "j2");
    }

    #[tokio::test]
    async fn empty_pop_is_not_an_error() {
        let store = MemoryStore::new();
        assert!(store.pop_pending_job("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pop_skips_ids_without_records() {
        let store = MemoryStore::new();
        store.queue_pending_job(&job("ghost", "a")).await.unwrap();
        store.queue_pending_job(&job("real", "a")).await.unwrap();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.jobs.remove("ghost");
        }

        let popped = store.pop_pending_job("a").await.unwrap().unwrap();
        assert_eq!(popped.id, "real");
        assert!(store.pop_pending_job("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queue_pending_persists_the_record() {
        let store = MemoryStore::new();
        store.queue_pending_job(&job("j1", "a")).await.unwrap();
        assert!(store.job_exists("j1").await.unwrap());
        assert_eq!(store.queue_len("a"), 1);
    }

    #[tokio::test]
    async fn set_job_state_updates_meta() {
        let store = MemoryStore::new();
        store.save_job(&job("j1", "a")).await.unwrap();
        store
            .set_job_state("j1", JobState::Failed, Some("boom"))
            .await
            .unwrap();

        let job = store.get_job("j1").await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.meta, "boom");
    }

    #[tokio::test]
    async fn scan_paginates_and_terminates() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store
                .save_aggregation(&Aggregation {
                    id: format!("a{n}"),
                    limit: 1,
                })
                .await
                .unwrap();
        }

        let (first, cursor) = store.scan_aggregation_ids(0, 2).await.unwrap();
        assert_eq!(first, vec!["a0", "a1"]);
        assert_ne!(cursor, 0);

        let mut seen = first;
        let mut cursor = cursor;
        while cursor != 0 {
            let (ids, next) = store.scan_aggregation_ids(cursor, 2).await.unwrap();
            seen.extend(ids);
            cursor = next;
        }
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn missing_aggregation_is_an_error() {
        let store = MemoryStore::new();
        let err = store.get_aggregation("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::AggregationNotFound(_)));
    }
}
