//! Batch job executor.
//!
//! Takes a batch of job ids, loads them in one read, and runs every job
//! through gate → dependency check → admission → routing on its own Tokio
//! task. The batch resolves only once every task has finished; outcomes
//! are returned in input order, not completion order.

use std::collections::HashMap;
use std::sync::Arc;

use blockjobs_core::job::{Job, JobStatus};
use blockjobs_core::outcome::JobOutcome;
use blockjobs_core::types::DbId;
use chrono::Utc;
use tokio::task::JoinSet;

use crate::dependencies;
use crate::error::EngineError;
use crate::router::JobRouter;
use crate::store::JobStore;

/// Fan-out/fan-in executor over a [`JobStore`] and a [`JobRouter`].
///
/// Cheap to clone; each per-job task holds its own clone.
#[derive(Clone)]
pub struct BatchExecutor {
    store: Arc<dyn JobStore>,
    router: Arc<JobRouter>,
}

impl BatchExecutor {
    pub fn new(store: Arc<dyn JobStore>, router: Arc<JobRouter>) -> Self {
        Self { store, router }
    }

    /// Run a batch and return one outcome per input id, in input order.
    ///
    /// Per-job conditions become `failed` outcomes. A store or transport
    /// failure in any job fails the whole batch, but only after every
    /// other job's task has finished.
    pub async fn execute(&self, ids: &[DbId]) -> Result<Vec<JobOutcome>, EngineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let loaded: HashMap<DbId, Job> = self
            .store
            .fetch_many(&unique)
            .await?
            .into_iter()
            .map(|job| (job.id, job))
            .collect();

        tracing::info!(
            batch_size = ids.len(),
            found = loaded.len(),
            "Executing job batch",
        );

        let mut tasks = JoinSet::new();
        for (index, id) in ids.iter().copied().enumerate() {
            let job = loaded.get(&id).cloned();
            let executor = self.clone();
            tasks.spawn(async move { (index, executor.run_one(id, job).await) });
        }

        let mut slots: Vec<Option<JobOutcome>> = vec![None; ids.len()];
        let mut first_error: Option<EngineError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(outcome))) => slots[index] = Some(outcome),
                Ok((index, Err(e))) => {
                    tracing::error!(job_id = ids[index], error = %e, "Job task failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Job task panicked or was aborted");
                    first_error.get_or_insert(EngineError::TaskFailed(e.to_string()));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let outcomes = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    EngineError::TaskFailed(format!("no outcome for batch position {index}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dispatched = outcomes.iter().filter(|o| o.is_dispatched()).count();
        tracing::info!(
            batch_size = outcomes.len(),
            dispatched,
            failed = outcomes.len() - dispatched,
            "Job batch resolved",
        );

        Ok(outcomes)
    }

    async fn run_one(&self, id: DbId, job: Option<Job>) -> Result<JobOutcome, EngineError> {
        let Some(job) = job else {
            tracing::info!(job_id = id, "Job not found");
            return Ok(JobOutcome::not_found(id));
        };

        if job.status != JobStatus::Pending {
            tracing::info!(job_id = id, status = %job.status, "Job is not pending");
            return Ok(JobOutcome::ineligible(job));
        }

        if !dependencies::is_ready(&job, self.store.as_ref()).await? {
            tracing::info!(job_id = id, "Job dependencies are not completed");
            return Ok(JobOutcome::dependencies_pending(job));
        }

        let started = job.clone().start_processing(Utc::now());
        if !self.store.admit(&started).await? {
            tracing::warn!(job_id = id, "Job changed state between check and admission");
            return Ok(JobOutcome::admission_lost(job));
        }
        tracing::info!(job_id = id, job_type = %started.job_type, "Job started processing");

        self.router.route(started).await
    }
}
