//! Per-job results returned to the batch caller.
//!
//! An outcome describes what happened to a job *in this request*; it is
//! distinct from the job's persisted [`JobStatus`](crate::job::JobStatus).

use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::types::DbId;

pub const MSG_NOT_FOUND: &str = "Job not found";
pub const MSG_DEPENDENCIES_PENDING: &str = "Dependencies are not completed";
pub const MSG_ADMISSION_LOST: &str = "Job state changed before it could be started";

/// Whether the executor handed the job to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Failed,
    Dispatched,
}

/// Result entry for one id of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: DbId,
    /// The job as last seen by the executor or its handler. `None` when
    /// the id was not found.
    pub job: Option<Job>,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobOutcome {
    pub fn not_found(job_id: DbId) -> Self {
        Self {
            job_id,
            job: None,
            request_status: RequestStatus::Failed,
            message: Some(MSG_NOT_FOUND.into()),
        }
    }

    /// The job was not `PENDING` when the batch loaded it.
    pub fn ineligible(job: Job) -> Self {
        let message = format!(
            "Job is not ready to be processed. Current status: {}",
            job.status
        );
        Self::failed(job, message)
    }

    pub fn dependencies_pending(job: Job) -> Self {
        Self::failed(job, MSG_DEPENDENCIES_PENDING)
    }

    pub fn admission_lost(job: Job) -> Self {
        Self::failed(job, MSG_ADMISSION_LOST)
    }

    pub fn failed(job: Job, message: impl Into<String>) -> Self {
        Self {
            job_id: job.id,
            job: Some(job),
            request_status: RequestStatus::Failed,
            message: Some(message.into()),
        }
    }

    pub fn dispatched(job: Job, message: impl Into<String>) -> Self {
        Self {
            job_id: job.id,
            job: Some(job),
            request_status: RequestStatus::Dispatched,
            message: Some(message.into()),
        }
    }

    pub fn is_dispatched(&self) -> bool {
        self.request_status == RequestStatus::Dispatched
    }
}
