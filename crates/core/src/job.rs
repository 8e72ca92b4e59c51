//! Job record, status and type enums, and the append-only lifecycle log.
//!
//! A [`Job`] is created `PENDING`, moved to `PROCESSING` by the batch
//! executor, and finalized to `COMPLETED` or `FAILED` by the handler for
//! its type. Every transition is recorded as a [`LogEntry`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Wire values for [`JobStatus`].
pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_PROCESSING: &str = "PROCESSING";
pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_FAILED: &str = "FAILED";

/// All valid status strings.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_PENDING,
    STATUS_PROCESSING,
    STATUS_COMPLETED,
    STATUS_FAILED,
];

/// Wire values for [`JobType`].
pub const TYPE_BOOK_SUMMARY: &str = "book_summary";
pub const TYPE_TRANSCRIPTION: &str = "transcription";
pub const TYPE_INDEXING: &str = "indexing";

/// Log message written when a job is first stored.
pub const MSG_CREATED: &str = "Job created";

/// Log message written when the executor admits a job into processing.
pub const MSG_STARTED: &str = "Job started processing";

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Persisted lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            STATUS_PENDING => Ok(Self::Pending),
            STATUS_PROCESSING => Ok(Self::Processing),
            STATUS_COMPLETED => Ok(Self::Completed),
            STATUS_FAILED => Ok(Self::Failed),
            _ => Err(format!(
                "Invalid job status '{s}'. Must be one of: {}",
                VALID_STATUSES.join(", ")
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => STATUS_PENDING,
            Self::Processing => STATUS_PROCESSING,
            Self::Completed => STATUS_COMPLETED,
            Self::Failed => STATUS_FAILED,
        }
    }

    /// `COMPLETED` and `FAILED` are final; nothing in the engine moves a
    /// job out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobType
// ---------------------------------------------------------------------------

/// The closed set of job types the router knows how to handle.
///
/// Jobs store their type as a plain string so that a row written with an
/// unregistered type can still be loaded; it only fails when routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    BookSummary,
    Transcription,
    Indexing,
}

impl JobType {
    /// Every variant, in declaration order.
    pub const ALL: [JobType; 3] = [Self::BookSummary, Self::Transcription, Self::Indexing];

    /// Convert from a stored type string.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            TYPE_BOOK_SUMMARY => Ok(Self::BookSummary),
            TYPE_TRANSCRIPTION => Ok(Self::Transcription),
            TYPE_INDEXING => Ok(Self::Indexing),
            _ => Err(format!("Unknown job type: {s}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookSummary => TYPE_BOOK_SUMMARY,
            Self::Transcription => TYPE_TRANSCRIPTION,
            Self::Indexing => TYPE_INDEXING,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// One lifecycle event in a job's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub message: String,
}

impl LogEntry {
    pub fn at(timestamp: Timestamp, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    pub fn now(message: impl Into<String>) -> Self {
        Self::at(Utc::now(), message)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of schedulable, typed work with persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: DbId,
    /// Raw type discriminator; parse with [`Job::parsed_type`].
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    /// Jobs that must be `COMPLETED` before this one may run.
    #[serde(default)]
    pub dependencies: Vec<DbId>,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    /// Type-specific payload, opaque to the executor.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Owning book, carried but not interpreted by the executor.
    #[serde(default)]
    pub book_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Job {
    pub fn parsed_type(&self) -> Result<JobType, String> {
        JobType::from_str_value(&self.job_type)
    }

    /// Return a copy of this job with one more log entry. Earlier entries
    /// are carried over untouched.
    pub fn with_log_entry(mut self, entry: LogEntry) -> Self {
        self.log.push(entry);
        self
    }

    /// The job as the executor persists it on admission: `PROCESSING`
    /// plus a start entry stamped `now`.
    pub fn start_processing(self, now: Timestamp) -> Self {
        let mut job = self.with_log_entry(LogEntry::at(now, MSG_STARTED));
        job.status = JobStatus::Processing;
        job
    }

    /// Move the job to `status`, recording `message` in the log.
    pub fn transition(self, status: JobStatus, message: impl Into<String>) -> Self {
        let mut job = self.with_log_entry(LogEntry::now(message));
        job.status = status;
        job
    }

    /// Time of the most recent lifecycle event, falling back to the
    /// store's `updated_at` for jobs with an empty log.
    pub fn last_activity(&self) -> Option<Timestamp> {
        self.log
            .iter()
            .map(|entry| entry.timestamp)
            .max()
            .or(self.updated_at)
    }
}

/// Input for creating a new `PENDING` job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub dependencies: Vec<DbId>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub book_id: Option<String>,
}

impl NewJob {
    /// Reject types with no registered handler.
    pub fn validate(&self) -> Result<JobType, CoreError> {
        JobType::from_str_value(&self.job_type).map_err(CoreError::Validation)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Whether every id in `dependencies` appears in `found` with status
/// `COMPLETED`. A dependency missing from `found` counts as not ready.
pub fn dependencies_satisfied(dependencies: &[DbId], found: &[Job]) -> bool {
    dependencies.iter().all(|dep_id| {
        found
            .iter()
            .any(|job| job.id == *dep_id && job.status == JobStatus::Completed)
    })
}

/// Check that `incoming` is a legal full replacement of `current`.
///
/// Type and dependencies are immutable, and the log may only grow: the
/// stored entries must be an exact prefix of the incoming log.
pub fn validate_replacement(current: &Job, incoming: &Job) -> Result<(), CoreError> {
    if current.id != incoming.id {
        return Err(CoreError::Validation(format!(
            "Job id mismatch: {} vs {}",
            current.id, incoming.id
        )));
    }
    if current.job_type != incoming.job_type {
        return Err(CoreError::Validation("Job type cannot be changed".into()));
    }
    if current.dependencies != incoming.dependencies {
        return Err(CoreError::Validation(
            "Job dependencies cannot be changed".into(),
        ));
    }
    let stored = current.log.len();
    if incoming.log.len() < stored || incoming.log[..stored] != current.log[..] {
        return Err(CoreError::Validation(
            "Job log is append-only; existing entries must be preserved".into(),
        ));
    }
    Ok(())
}
