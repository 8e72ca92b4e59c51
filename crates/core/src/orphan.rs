//! Detection and resolution of orphaned `PROCESSING` jobs.
//!
//! A job is orphaned when it was admitted into processing but its handler
//! never finalized it: the type had no handler, or the process died
//! mid-flight. What happens to such jobs is an explicit configuration
//! choice ([`OrphanPolicy`]); the default only reports them.

use serde::{Deserialize, Serialize};

use crate::job::{Job, JobStatus};
use crate::types::Timestamp;

pub const POLICY_REPORT: &str = "report";
pub const POLICY_FAIL: &str = "fail";
pub const POLICY_REQUEUE: &str = "requeue";

pub const VALID_POLICIES: &[&str] = &[POLICY_REPORT, POLICY_FAIL, POLICY_REQUEUE];

pub const MSG_QUARANTINED: &str = "Job quarantined after exceeding the processing timeout";
pub const MSG_REQUEUED: &str = "Job requeued after exceeding the processing timeout";

/// What the reconciler does with an orphaned job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Log the orphan and leave it `PROCESSING`.
    #[default]
    Report,
    /// Mark it `FAILED`.
    Fail,
    /// Return it to `PENDING` so a later batch can admit it again.
    Requeue,
}

impl OrphanPolicy {
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            POLICY_REPORT => Ok(Self::Report),
            POLICY_FAIL => Ok(Self::Fail),
            POLICY_REQUEUE => Ok(Self::Requeue),
            _ => Err(format!(
                "Invalid orphan policy '{s}'. Must be one of: {}",
                VALID_POLICIES.join(", ")
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Report => POLICY_REPORT,
            Self::Fail => POLICY_FAIL,
            Self::Requeue => POLICY_REQUEUE,
        }
    }
}

/// A `PROCESSING` job with no lifecycle activity for at least `timeout`.
/// Jobs with no recorded activity at all count as orphaned.
pub fn is_orphaned(job: &Job, now: Timestamp, timeout: chrono::Duration) -> bool {
    job.status == JobStatus::Processing
        && job
            .last_activity()
            .map_or(true, |last| now.signed_duration_since(last) >= timeout)
}

/// The replacement to persist for an orphan, or `None` when the policy
/// leaves it untouched.
pub fn resolve_orphan(job: Job, policy: OrphanPolicy) -> Option<Job> {
    match policy {
        OrphanPolicy::Report => None,
        OrphanPolicy::Fail => Some(job.transition(JobStatus::Failed, MSG_QUARANTINED)),
        OrphanPolicy::Requeue => Some(job.transition(JobStatus::Pending, MSG_REQUEUED)),
    }
}
