pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                 submit (POST), replace (PUT)
/// /jobs/execute         run a batch of job ids (POST)
/// /jobs/reconcile       one orphan reconciliation pass (POST)
/// /jobs/{id}            get (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
