//! Dependency satisfaction check.
//!
//! Always re-reads the dependencies from the store rather than trusting
//! the copies loaded with the batch. The result is advisory: it is not
//! atomic with the subsequent transition, which is why
//! [`JobStore::admit`] re-validates the same condition when writing.

use blockjobs_core::job::{dependencies_satisfied, Job};

use crate::store::{JobStore, StoreError};

/// Whether every dependency of `job` is currently `COMPLETED`.
///
/// Jobs without dependencies are ready without a store read. A dependency
/// that no longer exists counts as not ready.
pub async fn is_ready(job: &Job, store: &dyn JobStore) -> Result<bool, StoreError> {
    if job.dependencies.is_empty() {
        return Ok(true);
    }

    let found = store.fetch_many(&job.dependencies).await?;
    let ready = dependencies_satisfied(&job.dependencies, &found);

    tracing::debug!(
        job_id = job.id,
        dependencies = ?job.dependencies,
        found = found.len(),
        ready,
        "Checked job dependencies",
    );

    Ok(ready)
}
