use std::path::PathBuf;
use std::sync::Arc;

use crate::observability::Metrics;
use crate::store::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub heartbeat_path: PathBuf,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, heartbeat_path: PathBuf, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            heartbeat_path,
            metrics,
        }
    }
}
