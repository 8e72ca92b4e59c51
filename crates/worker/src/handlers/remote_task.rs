//! Job types whose work is performed by an external HTTP service.
//!
//! The job is POSTed as JSON to the endpoint configured for its type. A
//! 2xx answer completes the job, storing any JSON response body under
//! `data.result`; any other status fails it.

use std::sync::Arc;

use async_trait::async_trait;
use blockjobs_core::job::{Job, JobType};
use blockjobs_core::outcome::JobOutcome;

use super::{finish, merge_data, HandlerError};
use crate::error::EngineError;
use crate::router::JobHandler;
use crate::store::JobStore;

pub struct RemoteTaskHandler {
    job_type: JobType,
    endpoint: Option<String>,
    store: Arc<dyn JobStore>,
    client: reqwest::Client,
}

impl RemoteTaskHandler {
    pub fn new(
        job_type: JobType,
        endpoint: Option<String>,
        store: Arc<dyn JobStore>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            job_type,
            endpoint,
            store,
            client,
        }
    }

    fn endpoint_var(&self) -> &'static str {
        match self.job_type {
            JobType::Transcription => "TRANSCRIPTION_ENDPOINT",
            JobType::Indexing => "INDEXING_ENDPOINT",
            JobType::BookSummary => "BOOK_SUMMARY_ENDPOINT",
        }
    }

    async fn run(&self, job: &Job) -> Result<serde_json::Value, HandlerError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(HandlerError::NotConfigured(self.endpoint_var()))?;

        tracing::debug!(job_id = job.id, job_type = %self.job_type, endpoint, "Posting job to remote task endpoint");
        let response = self.client.post(endpoint).json(job).send().await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(HandlerError::Service {
                service: "task endpoint",
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(result) => Ok(merge_data(&job.data, "result", result)),
            Err(_) => Ok(job.data.clone()),
        }
    }
}

#[async_trait]
impl JobHandler for RemoteTaskHandler {
    async fn handle(&self, job: Job) -> Result<JobOutcome, EngineError> {
        let result = self.run(&job).await;
        finish(self.store.as_ref(), job, result).await
    }
}
