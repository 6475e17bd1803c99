use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    error::ApiError,
    models::{DownloadRequest, JobCreatedResponse},
    state::AppState,
};
use crate::job::{Aggregation, Job};

/// Attempts at allocating a job ID before giving up.
const ID_ATTEMPTS: usize = 3;

/// Download ingestion endpoint (POST /download)
///
/// Validates the payload, allocates a unique job ID (verified against the
/// store), creates the aggregation on first reference, then persists and
/// enqueues the job for the processor to pick up on its next scan.
///
/// Resubmitting an existing aggregation with a different `aggr_limit` does
/// not change the stored limit.
pub async fn create_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_request(&request)?;

    let job_id = allocate_job_id(&state).await?;

    if !state.store.aggregation_exists(&request.aggr_id).await? {
        let aggr = Aggregation {
            id: request.aggr_id.clone(),
            limit: request.aggr_limit,
        };
        state.store.save_aggregation(&aggr).await?;
        info!(aggr = %aggr.id, limit = aggr.limit, "created aggregation");
    }

    let mut job = Job::new(job_id, request.url, request.aggr_id);
    job.callback_url = request.callback_url;
    job.extra = request.extra;
    state.store.queue_pending_job(&job).await?;

    state.metrics.job_accepted();
    info!(job = %job.id, aggr = %job.aggr_id, "enqueued download");

    Ok((
        StatusCode::CREATED,
        Json(JobCreatedResponse { id: job.id }),
    ))
}

/// Heartbeat endpoint (GET /hb)
///
/// Answers 200 "OK" unless the configured sentinel file exists, in which
/// case the service is administratively disabled and answers 503.
pub async fn heartbeat(State(state): State<AppState>) -> impl IntoResponse {
    match tokio::fs::metadata(&state.heartbeat_path).await {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::OK, "OK".to_string())
        }
        Ok(_) | Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!(
                "Service disabled, '{}' exists!",
                state.heartbeat_path.display()
            ),
        ),
    }
}

fn validate_request(request: &DownloadRequest) -> Result<(), ApiError> {
    if request.aggr_id.is_empty() {
        return Err(ApiError::InvalidPayload("aggr_id must not be empty".into()));
    }
    if request.aggr_limit == 0 {
        return Err(ApiError::InvalidPayload(
            "aggr_limit must be greater than zero".into(),
        ));
    }
    let url = reqwest::Url::parse(&request.url)
        .map_err(|err| ApiError::InvalidPayload(format!("url is not valid: {err}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ApiError::InvalidPayload(format!(
            "url scheme '{}' is not supported",
            url.scheme()
        )));
    }
    Ok(())
}

/// Generates a job ID and verifies its uniqueness against the store,
/// retrying a bounded number of times.
async fn allocate_job_id(state: &AppState) -> Result<String, ApiError> {
    for _ in 0..ID_ATTEMPTS {
        let candidate = Uuid::new_v4().simple().to_string();
        if !state.store.job_exists(&candidate).await? {
            return Ok(candidate);
        }
        warn!(id = %candidate, "job id collision, retrying");
    }
    Err(ApiError::Internal(format!(
        "could not allocate a unique job id after {ID_ATTEMPTS} attempts"
    )))
}
