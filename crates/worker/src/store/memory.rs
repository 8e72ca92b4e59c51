//! In-process [`JobStore`] used by tests and database-less local runs.
//!
//! Records every read and write so callers can assert on exactly which
//! store calls a batch produced.

use std::collections::HashMap;

use async_trait::async_trait;
use blockjobs_core::job::{Job, JobStatus, LogEntry, NewJob, MSG_CREATED};
use blockjobs_core::types::DbId;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{JobStore, StoreError};

#[derive(Default)]
struct State {
    jobs: HashMap<DbId, Job>,
    next_id: DbId,
    fetches: Vec<Vec<DbId>>,
    writes: Vec<Job>,
    unavailable: bool,
}

impl State {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    /// Copy the mutable fields of `job` over the stored record.
    fn apply(&mut self, job: &Job) -> Result<Job, StoreError> {
        let stored = self
            .jobs
            .get_mut(&job.id)
            .ok_or(StoreError::NotFound { id: job.id })?;
        stored.status = job.status;
        stored.log = job.log.clone();
        stored.data = job.data.clone();
        stored.updated_at = Some(Utc::now());
        let written = stored.clone();
        self.writes.push(written.clone());
        Ok(written)
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    state: RwLock<State>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records. Seeding is not recorded as a
    /// write.
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let mut state = State::default();
        for job in jobs {
            state.next_id = state.next_id.max(job.id);
            state.jobs.insert(job.id, job);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn get(&self, id: DbId) -> Option<Job> {
        self.state.read().await.jobs.get(&id).cloned()
    }

    /// Every id list passed to `fetch_many`, in call order.
    pub async fn fetches(&self) -> Vec<Vec<DbId>> {
        self.state.read().await.fetches.clone()
    }

    /// Every job written through `update` or a successful `admit`.
    pub async fn writes(&self) -> Vec<Job> {
        self.state.read().await.writes.clone()
    }

    pub async fn writes_for(&self, id: DbId) -> Vec<Job> {
        self.state
            .read()
            .await
            .writes
            .iter()
            .filter(|job| job.id == id)
            .cloned()
            .collect()
    }

    /// Make every subsequent call fail as if the database were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn fetch_many(&self, ids: &[DbId]) -> Result<Vec<Job>, StoreError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state.fetches.push(ids.to_vec());
        let mut found: Vec<Job> = ids
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect();
        found.sort_by_key(|job| job.id);
        found.dedup_by_key(|job| job.id);
        Ok(found)
    }

    async fn update(&self, job: &Job) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state.apply(job)?;
        Ok(())
    }

    async fn admit(&self, job: &Job) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let Some(stored) = state.jobs.get(&job.id) else {
            return Ok(false);
        };
        let admissible = stored.status == JobStatus::Pending
            && stored.dependencies.iter().all(|dep| {
                state
                    .jobs
                    .get(dep)
                    .is_some_and(|d| d.status == JobStatus::Completed)
            });
        if !admissible {
            return Ok(false);
        }
        state.apply(job)?;
        Ok(true)
    }

    async fn resolve_orphan(&self, job: &Job, seen_log_len: usize) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let unchanged = state.jobs.get(&job.id).is_some_and(|stored| {
            stored.status == JobStatus::Processing && stored.log.len() == seen_log_len
        });
        if !unchanged {
            return Ok(false);
        }
        state.apply(job)?;
        Ok(true)
    }

    async fn create(&self, input: &NewJob) -> Result<Job, StoreError> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state.next_id += 1;
        let now = Utc::now();
        let job = Job {
            id: state.next_id,
            job_type: input.job_type.clone(),
            status: JobStatus::Pending,
            dependencies: input.dependencies.clone(),
            log: vec![LogEntry::at(now, MSG_CREATED)],
            data: if input.data.is_null() {
                serde_json::json!({})
            } else {
                input.data.clone()
            },
            book_id: input.book_id.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let state = self.state.read().await;
        state.check_available()?;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.state.read().await.check_available()
    }
}
