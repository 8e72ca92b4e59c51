//! Handlers for the `/jobs` resource.

use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use blockjobs_core::error::CoreError;
use blockjobs_core::job::{validate_replacement, Job, NewJob};
use blockjobs_core::types::DbId;
use blockjobs_worker::JobStore;

use crate::error::{AppError, AppResult};
use crate::response::{BatchResponse, DataResponse};
use crate::state::AppState;

/// Message returned with every resolved batch.
pub const MSG_BATCH_PROCESSED: &str = "Batch processed";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_job(store: &dyn JobStore, job_id: DbId) -> AppResult<Job> {
    store
        .fetch_many(&[job_id])
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/execute
///
/// Run a batch of job ids. Answers 200 once every job has resolved, with one
/// outcome per id in request order. Per-job failures are outcomes, not HTTP
/// errors.
pub async fn execute_batch(
    State(state): State<AppState>,
    Json(ids): Json<Vec<DbId>>,
) -> AppResult<impl IntoResponse> {
    let outcomes = state.executor.execute(&ids).await?;

    Ok(Json(BatchResponse {
        message: MSG_BATCH_PROCESSED,
        data: outcomes,
    }))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a `PENDING` job. The type must be registered and every dependency
/// must already exist. Returns 201 with the created job.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<NewJob>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    if !input.dependencies.is_empty() {
        let found: HashSet<DbId> = state
            .store
            .fetch_many(&input.dependencies)
            .await?
            .into_iter()
            .map(|job| job.id)
            .collect();
        if let Some(missing) = input.dependencies.iter().find(|id| !found.contains(id)) {
            return Err(AppError::BadRequest(format!(
                "Dependency job {missing} does not exist"
            )));
        }
    }

    let job = state.store.create(&input).await?;

    tracing::info!(
        job_id = job.id,
        job_type = %job.job_type,
        dependencies = ?job.dependencies,
        "Job submitted",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Replace
// ---------------------------------------------------------------------------

/// PUT /api/v1/jobs
///
/// Persist a full replacement of an existing job. `type` and
/// `dependencies` are immutable and the log may only grow.
pub async fn update_job(
    State(state): State<AppState>,
    Json(incoming): Json<Job>,
) -> AppResult<impl IntoResponse> {
    let current = find_job(state.store.as_ref(), incoming.id).await?;
    validate_replacement(&current, &incoming)?;

    state.store.update(&incoming).await?;
    let stored = find_job(state.store.as_ref(), incoming.id).await?;

    tracing::info!(job_id = stored.id, status = %stored.status, "Job replaced");

    Ok(Json(DataResponse { data: stored }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(state.store.as_ref(), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/reconcile
///
/// Run one orphan reconciliation pass with the configured policy.
pub async fn reconcile(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let report = state.reconciler.reconcile().await?;
    Ok(Json(DataResponse { data: report }))
}
