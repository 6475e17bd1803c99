use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::services::{create_download, heartbeat};
use super::state::AppState;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/download", post(create_download))
        .route("/hb", get(heartbeat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the ingress API until the shutdown token is cancelled, then drain
/// in-flight requests and return.
pub async fn serve(
    address: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), AnyError> {
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
