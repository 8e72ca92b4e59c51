//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                -> submit_job
/// PUT    /                -> update_job
/// POST   /execute         -> execute_batch
/// POST   /reconcile       -> reconcile
/// GET    /{id}            -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jobs::submit_job).put(jobs::update_job))
        .route("/execute", post(jobs::execute_batch))
        .route("/reconcile", post(jobs::reconcile))
        .route("/{id}", get(jobs::get_job))
}
