//! Job record accessor.
//!
//! [`JobStore`] is the only way the engine touches persisted jobs. Every
//! write carries the full job; stores never patch individual fields.

use async_trait::async_trait;
use blockjobs_core::job::{Job, JobStatus, NewJob};
use blockjobs_core::types::DbId;

pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

/// Errors raised by a [`JobStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {id} not found")]
    NotFound { id: DbId },

    /// A stored record could not be turned into a [`Job`].
    #[error("Corrupt job record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Current stored state of each requested job. Unknown ids are
    /// absent from the result.
    async fn fetch_many(&self, ids: &[DbId]) -> Result<Vec<Job>, StoreError>;

    /// Replace the mutable fields (status, log, data) of an existing job.
    async fn update(&self, job: &Job) -> Result<(), StoreError>;

    /// Write `job` only if the stored copy is still `PENDING` and every
    /// dependency is `COMPLETED`, atomically. Returns whether the write
    /// happened.
    async fn admit(&self, job: &Job) -> Result<bool, StoreError>;

    /// Write `job` only if the stored copy is still `PROCESSING` with
    /// exactly `seen_log_len` log entries, atomically. Returns whether the
    /// write happened; `false` means the job moved on after it was read.
    async fn resolve_orphan(&self, job: &Job, seen_log_len: usize) -> Result<bool, StoreError>;

    /// Insert a new `PENDING` job.
    async fn create(&self, input: &NewJob) -> Result<Job, StoreError>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
