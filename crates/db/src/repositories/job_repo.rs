//! Repository for the `jobs` table.
//!
//! Status literals always come from `JobStatus::as_str`, never inline SQL.
//! Writes replace the mutable columns (status, log, data) as a whole;
//! `job_type` and `dependencies` are fixed at insert time.

use blockjobs_core::job::{Job, JobStatus, LogEntry, NewJob, MSG_CREATED};
use blockjobs_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::job::JobRow;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status, dependencies, log, data, book_id, \
    created_at, updated_at";

/// Provides the queries the job store needs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new `PENDING` job with a single creation log entry.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<JobRow, sqlx::Error> {
        let log = vec![LogEntry::now(MSG_CREATED)];
        let data = if input.data.is_null() {
            serde_json::json!({})
        } else {
            input.data.clone()
        };
        let query = format!(
            "INSERT INTO jobs (job_type, status, dependencies, log, data, book_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(&input.job_type)
            .bind(JobStatus::Pending.as_str())
            .bind(&input.dependencies)
            .bind(Json(&log))
            .bind(&data)
            .bind(&input.book_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Load every job whose id is in `ids`. Unknown ids are simply absent.
    pub async fn fetch_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<JobRow>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Replace the mutable columns of a job. Returns `false` if no row
    /// with that id exists.
    pub async fn replace(pool: &PgPool, job: &Job) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status = $2, log = $3, data = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(Json(&job.log))
        .bind(&job.data)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist `job` only if the stored row is still `PENDING` and every
    /// one of its dependencies is `COMPLETED`, in a single statement.
    ///
    /// Returns `false` when the guard no longer holds (another batch won
    /// the admission, or a dependency regressed since it was checked).
    pub async fn admit(pool: &PgPool, job: &Job) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs AS j \
             SET status = $2, log = $3, data = $4, updated_at = NOW() \
             WHERE j.id = $1 \
               AND j.status = $5 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM unnest(j.dependencies) AS dep(id) \
                   LEFT JOIN jobs AS d ON d.id = dep.id \
                   WHERE d.status IS DISTINCT FROM $6 \
               )",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(Json(&job.log))
        .bind(&job.data)
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Completed.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist `job` only if the stored row is still `PROCESSING` and its
    /// log has exactly `seen_log_len` entries, in a single statement.
    ///
    /// Returns `false` when the job was finished or otherwise written to
    /// after it was read.
    pub async fn resolve_orphan(
        pool: &PgPool,
        job: &Job,
        seen_log_len: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status = $2, log = $3, data = $4, updated_at = NOW() \
             WHERE id = $1 \
               AND status = $5 \
               AND jsonb_array_length(log)::BIGINT = $6",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(Json(&job.log))
        .bind(&job.data)
        .bind(JobStatus::Processing.as_str())
        .bind(seen_log_len)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_status(
        pool: &PgPool,
        status: JobStatus,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE status = $1 ORDER BY id");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(status.as_str())
            .fetch_all(pool)
            .await
    }
}
