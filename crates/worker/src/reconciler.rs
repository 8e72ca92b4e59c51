//! Reconciliation sweep for orphaned `PROCESSING` jobs.
//!
//! Jobs can be left in `PROCESSING` when their stored type has no handler
//! or when a handler never finalized them. The sweep finds jobs with no
//! log activity for longer than the orphan timeout and applies the
//! configured [`OrphanPolicy`].

use std::sync::Arc;
use std::time::Duration;

use blockjobs_core::job::JobStatus;
use blockjobs_core::orphan::{is_orphaned, resolve_orphan, OrphanPolicy};
use blockjobs_core::types::{DbId, Timestamp};
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::store::{JobStore, StoreError};

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub policy: OrphanPolicy,
    /// Number of `PROCESSING` jobs examined.
    pub scanned: usize,
    /// Jobs found past the orphan timeout.
    pub orphaned: Vec<DbId>,
    /// Orphans the policy rewrote (empty under `report`).
    pub resolved: Vec<DbId>,
}

pub struct Reconciler {
    store: Arc<dyn JobStore>,
    policy: OrphanPolicy,
    timeout: chrono::Duration,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>, policy: OrphanPolicy, timeout: chrono::Duration) -> Self {
        Self {
            store,
            policy,
            timeout,
        }
    }

    pub fn from_config(store: Arc<dyn JobStore>, config: &EngineConfig) -> Self {
        Self::new(store, config.orphan_policy, config.orphan_timeout())
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport, StoreError> {
        self.reconcile_at(Utc::now()).await
    }

    /// One pass, treating `now` as the current time.
    pub async fn reconcile_at(&self, now: Timestamp) -> Result<ReconcileReport, StoreError> {
        let processing = self.store.list_by_status(JobStatus::Processing).await?;
        let mut report = ReconcileReport {
            policy: self.policy,
            scanned: processing.len(),
            orphaned: Vec::new(),
            resolved: Vec::new(),
        };

        for job in processing {
            if !is_orphaned(&job, now, self.timeout) {
                continue;
            }
            tracing::warn!(
                job_id = job.id,
                job_type = %job.job_type,
                last_activity = ?job.last_activity(),
                policy = self.policy.as_str(),
                "Orphaned job found",
            );
            report.orphaned.push(job.id);

            if self.policy == OrphanPolicy::Report {
                continue;
            }

            let Some(current) = self.store.fetch_many(&[job.id]).await?.into_iter().next() else {
                continue;
            };
            if !is_orphaned(&current, now, self.timeout) {
                continue;
            }
            let seen_log_len = current.log.len();
            let Some(next) = resolve_orphan(current, self.policy) else {
                continue;
            };
            // The write only lands if nothing touched the job since the
            // re-read; a handler finishing late wins.
            if self.store.resolve_orphan(&next, seen_log_len).await? {
                tracing::info!(job_id = next.id, status = %next.status, "Orphaned job resolved");
                report.resolved.push(next.id);
            } else {
                tracing::info!(job_id = next.id, "Orphaned job changed before it could be resolved");
            }
        }

        Ok(report)
    }

    /// Run a pass every `interval` until `cancel` is triggered.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(
            interval_secs = interval.as_secs(),
            policy = self.policy.as_str(),
            "Reconciler started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reconciler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.reconcile().await {
                        Ok(report) if !report.orphaned.is_empty() => {
                            tracing::info!(
                                orphaned = report.orphaned.len(),
                                resolved = report.resolved.len(),
                                "Reconciliation pass finished",
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Reconciliation pass failed"),
                    }
                }
            }
        }
    }
}
