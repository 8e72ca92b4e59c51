//! Handlers for the registered job types.
//!
//! Each handler performs its domain work and then finalizes the job through
//! [`finish`]: success writes `COMPLETED` with the handler's data, a domain
//! failure writes `FAILED` with the reason in the log. Transport failures
//! are not caught here; they abort the batch and leave the job
//! `PROCESSING` for the reconciler.

use std::sync::Arc;

use blockjobs_core::job::{Job, JobStatus, JobType};
use blockjobs_core::outcome::JobOutcome;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::router::{JobRouter, RouterError};
use crate::store::JobStore;

pub mod book_summary;
pub mod remote_task;

pub use book_summary::BookSummaryHandler;
pub use remote_task::RemoteTaskHandler;

pub const MSG_COMPLETED: &str = "Job completed";

/// Failures of a handler's own work.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The job's `data` lacks something the handler needs.
    #[error("Invalid job data: {0}")]
    InvalidData(String),

    /// A collaborator needed by this job type has no configuration.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// An external service answered with a non-2xx status.
    #[error("{service} returned HTTP {status}: {body}")]
    Service {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The work cannot be done for this input.
    #[error("{0}")]
    Rejected(String),

    /// The request never got an answer. Propagated, not recorded.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Persist the terminal status for `job` and build its outcome.
pub async fn finish(
    store: &dyn JobStore,
    job: Job,
    result: Result<serde_json::Value, HandlerError>,
) -> Result<JobOutcome, EngineError> {
    match result {
        Ok(data) => {
            let mut done = job.transition(JobStatus::Completed, MSG_COMPLETED);
            done.data = data;
            store.update(&done).await?;
            tracing::info!(job_id = done.id, job_type = %done.job_type, "Job completed");
            Ok(JobOutcome::dispatched(done, MSG_COMPLETED))
        }
        Err(HandlerError::Transport(e)) => {
            tracing::error!(job_id = job.id, error = %e, "Handler transport failure");
            Err(EngineError::Transport(e))
        }
        Err(e) => {
            let message = format!("Job failed: {e}");
            let failed = job.transition(JobStatus::Failed, message.clone());
            store.update(&failed).await?;
            tracing::warn!(job_id = failed.id, job_type = %failed.job_type, error = %e, "Job failed");
            Ok(JobOutcome::dispatched(failed, message))
        }
    }
}

/// Return `data` as an object with `key` set to `value`. Non-object data
/// is replaced by a fresh object.
pub fn merge_data(data: &serde_json::Value, key: &str, value: serde_json::Value) -> serde_json::Value {
    let mut object = match data {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    object.insert(key.to_string(), value);
    serde_json::Value::Object(object)
}

/// Build the HTTP client shared by all handlers.
pub fn http_client(config: &EngineConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(config.handler_timeout())
        .build()
}

/// Register a handler for every job type from `config`.
pub fn build_router(
    config: &EngineConfig,
    store: Arc<dyn JobStore>,
    client: reqwest::Client,
) -> Result<JobRouter, RouterError> {
    let summary = BookSummaryHandler::from_config(config, Arc::clone(&store), client.clone());
    let transcription = RemoteTaskHandler::new(
        JobType::Transcription,
        config.transcription_endpoint.clone(),
        Arc::clone(&store),
        client.clone(),
    );
    let indexing = RemoteTaskHandler::new(
        JobType::Indexing,
        config.indexing_endpoint.clone(),
        store,
        client,
    );

    JobRouter::builder()
        .register(JobType::BookSummary, Arc::new(summary))
        .register(JobType::Transcription, Arc::new(transcription))
        .register(JobType::Indexing, Arc::new(indexing))
        .build()
}
