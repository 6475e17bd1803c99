//! API models for the download ingest and heartbeat endpoints.
//!
//! `POST /download` accepts a single JSON object carrying both the job and
//! its aggregation:
//!
//! ```json
//! {
//!   "aggr_id": "tenant-7",
//!   "aggr_limit": 8,
//!   "url": "https://cdn.example.com/assets/video.mp4",
//!   "callback_url": "https://tenant.example.com/hooks/downloads"
//! }
//! ```
//!
//! On success the endpoint answers `201 Created` with a [`JobCreatedResponse`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    /// Aggregation the job belongs to; created on first reference.
    pub aggr_id: String,
    /// Concurrency ceiling for the aggregation. Ignored when the
    /// aggregation already exists.
    pub aggr_limit: usize,
    pub url: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Opaque client payload, stored on the job record and relayed to the
    /// callback by the external notifier.
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobCreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
