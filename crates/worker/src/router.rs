//! Job type router.
//!
//! Maps each [`JobType`] to exactly one [`JobHandler`]. The table is
//! checked for completeness when it is built, so a job whose type parses
//! always has a handler; only a stored type string outside the closed set
//! can fail routing, and that is reported as a `failed` outcome.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use blockjobs_core::job::{Job, JobType};
use blockjobs_core::outcome::JobOutcome;

use crate::error::EngineError;

/// Type-specific logic that performs a job's work.
///
/// A handler receives the job in `PROCESSING` and must persist a terminal
/// status (`COMPLETED` or `FAILED`) before it returns. Failures of the
/// work itself are recorded on the job; only store or transport failures
/// should come back as `Err`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job) -> Result<JobOutcome, EngineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("No handler registered for job type '{0}'")]
    MissingHandler(JobType),
}

/// Dispatch table from job type to handler.
pub struct JobRouter {
    /// Indexed by `JobType as usize`; one entry per variant.
    handlers: Vec<Arc<dyn JobHandler>>,
}

impl JobRouter {
    pub fn builder() -> JobRouterBuilder {
        JobRouterBuilder::default()
    }

    /// The handler registered for `job_type`. The same type always yields
    /// the same handler instance.
    pub fn handler_for(&self, job_type: JobType) -> &Arc<dyn JobHandler> {
        &self.handlers[job_type as usize]
    }

    /// Dispatch `job` to its handler and return the handler's outcome.
    ///
    /// An unparseable type leaves the job as it is (already `PROCESSING`)
    /// and yields a `failed` outcome.
    pub async fn route(&self, job: Job) -> Result<JobOutcome, EngineError> {
        let job_type = match job.parsed_type() {
            Ok(job_type) => job_type,
            Err(message) => {
                tracing::warn!(
                    job_id = job.id,
                    job_type = %job.job_type,
                    "No handler for job type; job left in PROCESSING",
                );
                return Ok(JobOutcome::failed(job, message));
            }
        };

        tracing::info!(job_id = job.id, %job_type, "Routing job to handler");
        self.handler_for(job_type).handle(job).await
    }
}

#[derive(Default)]
pub struct JobRouterBuilder {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl JobRouterBuilder {
    /// Register `handler` for `job_type`, replacing any earlier one.
    pub fn register(mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_type, handler);
        self
    }

    /// Finish the table. Fails unless every [`JobType`] has a handler.
    pub fn build(mut self) -> Result<JobRouter, RouterError> {
        let mut handlers = Vec::with_capacity(JobType::ALL.len());
        for job_type in JobType::ALL {
            let handler = self
                .handlers
                .remove(&job_type)
                .ok_or(RouterError::MissingHandler(job_type))?;
            handlers.push(handler);
        }
        Ok(JobRouter { handlers })
    }
}
