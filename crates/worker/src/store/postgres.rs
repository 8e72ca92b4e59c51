use async_trait::async_trait;
use blockjobs_core::job::{Job, JobStatus, NewJob};
use blockjobs_core::types::DbId;
use blockjobs_db::models::job::JobRow;
use blockjobs_db::repositories::JobRepo;
use blockjobs_db::DbPool;

use super::{JobStore, StoreError};

/// [`JobStore`] backed by the `jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn into_job(row: JobRow) -> Result<Job, StoreError> {
    Job::try_from(row).map_err(StoreError::Corrupt)
}

fn into_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, StoreError> {
    rows.into_iter().map(into_job).collect()
}

#[async_trait]
impl JobStore for PgJobStore {
    #[tracing::instrument(skip(self))]
    async fn fetch_many(&self, ids: &[DbId]) -> Result<Vec<Job>, StoreError> {
        into_jobs(JobRepo::fetch_many(&self.pool, ids).await?)
    }

    #[tracing::instrument(skip(self, job), fields(job_id = job.id, status = %job.status))]
    async fn update(&self, job: &Job) -> Result<(), StoreError> {
        if JobRepo::replace(&self.pool, job).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound { id: job.id })
        }
    }

    #[tracing::instrument(skip(self, job), fields(job_id = job.id))]
    async fn admit(&self, job: &Job) -> Result<bool, StoreError> {
        Ok(JobRepo::admit(&self.pool, job).await?)
    }

    #[tracing::instrument(skip(self, job), fields(job_id = job.id, status = %job.status))]
    async fn resolve_orphan(&self, job: &Job, seen_log_len: usize) -> Result<bool, StoreError> {
        let seen = i64::try_from(seen_log_len)
            .map_err(|_| StoreError::Corrupt(format!("job {}: log too long", job.id)))?;
        Ok(JobRepo::resolve_orphan(&self.pool, job, seen).await?)
    }

    async fn create(&self, input: &NewJob) -> Result<Job, StoreError> {
        into_job(JobRepo::create(&self.pool, input).await?)
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        into_jobs(JobRepo::list_by_status(&self.pool, status).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(blockjobs_db::health_check(&self.pool).await?)
    }
}
