//! Row model for the `jobs` table.

use blockjobs_core::job::{Job, JobStatus, LogEntry};
use blockjobs_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `jobs` table, before status parsing.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub job_type: String,
    pub status: String,
    pub dependencies: Vec<DbId>,
    pub log: Json<Vec<LogEntry>>,
    pub data: serde_json::Value,
    pub book_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = String;

    /// Fails only when the stored status is outside the CHECK constraint,
    /// i.e. the row was written by something other than this schema.
    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::from_str_value(&row.status)
            .map_err(|e| format!("job {}: {e}", row.id))?;
        Ok(Job {
            id: row.id,
            job_type: row.job_type,
            status,
            dependencies: row.dependencies,
            log: row.log.0,
            data: row.data,
            book_id: row.book_id,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}
