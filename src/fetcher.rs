//! Single-request HTTP fetcher with cancellation and outcome classification.
//!
//! One call performs one GET, streams the body to the destination file, and
//! classifies the result so the worker pool can apply its retry policy. The
//! fetcher itself never touches job state.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            user_agent: format!("fetchpool/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Classification of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx response, body fully written to the destination.
    Success,
    /// Retryable: 5xx, 408, 429, network/timeout errors, disk errors.
    Transient(String),
    /// Not retryable: other 4xx, TLS/certificate errors.
    Permanent(String),
    /// Aborted by the cancellation token; the caller writes no state.
    Cancelled,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        // Redirects follow the transport default (limited chain), counted
        // within the single request timeout.
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` into `dest`.
    ///
    /// The destination is created only once a 2xx status is observed, so a
    /// permanently-failed job leaves no artifact. An existing file is
    /// replaced; a partial file from an interrupted transfer stays in place
    /// for the next retry to overwrite.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        token: &CancellationToken,
    ) -> FetchOutcome {
        if token.is_cancelled() {
            return FetchOutcome::Cancelled;
        }

        let response = tokio::select! {
            _ = token.cancelled() => return FetchOutcome::Cancelled,
            result = self.client.get(url).send() => match result {
                Ok(response) => response,
                Err(err) => return classify_request_error(&err),
            },
        };

        let status = response.status();
        if let Some(outcome) = classify_status(status) {
            return outcome;
        }

        let mut response = response;
        let mut out = match File::create(dest).await {
            Ok(file) => file,
            Err(err) => {
                return FetchOutcome::Transient(format!("Could not write to file, {err}"))
            }
        };

        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return FetchOutcome::Cancelled,
                chunk = response.chunk() => match chunk {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(err) => {
                        return FetchOutcome::Transient(format!(
                            "Could not download file, {err}"
                        ))
                    }
                },
            };
            if let Err(err) = out.write_all(&chunk).await {
                return FetchOutcome::Transient(format!("Could not write to file, {err}"));
            }
        }

        if let Err(err) = out.flush().await {
            return FetchOutcome::Transient(format!("Could not write to file, {err}"));
        }

        debug!(%url, dest = %dest.display(), "download complete");
        FetchOutcome::Success
    }
}

/// Maps a non-2xx status to its outcome; `None` means proceed with the body.
fn classify_status(status: StatusCode) -> Option<FetchOutcome> {
    if status.is_success() {
        return None;
    }
    if status.is_server_error() {
        return Some(FetchOutcome::Transient(format!(
            "Received Status Code {}",
            status.as_u16()
        )));
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
        return Some(FetchOutcome::Transient(format!(
            "Received Status Code {}",
            status.as_u16()
        )));
    }
    if status.is_client_error() {
        return Some(FetchOutcome::Permanent(format!(
            "Received Status Code {}",
            status.as_u16()
        )));
    }
    // Informational or unfollowed redirect, neither of which a well-behaved
    // origin should hand us here. Retryable.
    Some(FetchOutcome::Transient(format!(
        "Received Status Code {}",
        status.as_u16()
    )))
}

fn classify_request_error(err: &reqwest::Error) -> FetchOutcome {
    if is_tls_error(err) {
        // A misconfigured peer will not fix itself between retries.
        return FetchOutcome::Permanent(format!("TLS error, {err}"));
    }
    FetchOutcome::Transient(format!("Could not perform request, {err}"))
}

/// Walks the error source chain looking for a TLS/certificate failure.
fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        let text = inner.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") {
            return true;
        }
        source = inner.source();
    }
    false
}
