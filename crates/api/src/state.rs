use std::sync::Arc;

use blockjobs_worker::{BatchExecutor, JobStore, Reconciler};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job record accessor shared with the executor and reconciler.
    pub store: Arc<dyn JobStore>,
    pub executor: BatchExecutor,
    pub reconciler: Arc<Reconciler>,
    pub config: Arc<ServerConfig>,
}
