//! Core domain records: download jobs and the aggregations that group them.
//!
//! Both types are persisted as JSON in the shared store and are read by the
//! external API and notifier services, so field names are part of the wire
//! contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on transient-failure re-attempts per job, process-wide.
pub const MAX_RETRIES: u32 = 3;

/// Lifecycle state of a [`Job`].
///
/// `Success` and `Failed` are terminal; once written, a job never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failed)
    }
}

/// One download request.
///
/// Created by the ingress API, mutated only by the worker pool that owns it
/// while in flight. Identity is by `id`; the API verifies uniqueness against
/// the store before saving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub url: String,
    pub aggr_id: String,
    pub state: JobState,
    #[serde(default)]
    pub retries: u32,
    /// Carries the most recent failure reason; cleared on success.
    #[serde(default)]
    pub meta: String,
    /// Path of the downloaded artifact once the job reaches `Success`.
    #[serde(default)]
    pub download_path: String,
    /// Callback endpoint for the external completion notifier.
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Opaque client payload, relayed untouched to the callback.
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: String, url: String, aggr_id: String) -> Self {
        Self {
            id,
            url,
            aggr_id,
            state: JobState::Pending,
            retries: 0,
            meta: String::new(),
            download_path: String::new(),
            callback_url: None,
            extra: None,
            created_at: Utc::now(),
        }
    }

    /// Whether another transient failure may be retried instead of
    /// terminalizing the job.
    pub fn can_retry(&self) -> bool {
        self.retries < MAX_RETRIES
    }
}

/// A named group of jobs sharing a concurrency ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub id: String,
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_pending() {
        let job = Job::new("j1".into(), "http://example.com/a".into(), "aggr".into());
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.retries, 0);
        assert!(job.meta.is_empty());
        assert!(job.can_retry());
    }

    #[test]
    fn retry_budget_is_bounded() {
        let mut job = Job::new("j1".into(), "http://example.com/a".into(), "aggr".into());
        job.retries = MAX_RETRIES - 1;
        assert!(job.can_retry());
        job.retries = MAX_RETRIES;
        assert!(!job.can_retry());
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Success.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::InProgress.is_terminal());
    }

    #[test]
    fn state_serializes_snake_case() {
        let encoded = serde_json::to_string(&JobState::InProgress).unwrap();
        assert_eq!(encoded, "\"in_progress\"");
    }
}
