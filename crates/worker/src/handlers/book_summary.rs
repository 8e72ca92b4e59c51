//! `book_summary` jobs: fetch a book's text and have a language model
//! summarize it.
//!
//! The text comes from the content service one section at a time, in the
//! order of the book's navigation. The summary is written to
//! `data.summary` on the job, next to the book's total narration length
//! in `data.duration` (seconds, summed over its section metadata).

use std::sync::Arc;

use async_trait::async_trait;
use blockjobs_core::job::Job;
use blockjobs_core::outcome::JobOutcome;
use serde::Deserialize;

use super::{finish, merge_data, HandlerError};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::router::JobHandler;
use crate::store::JobStore;

/// Instructions sent with every summary request.
pub const SUMMARY_SYSTEM_PROMPT: &str = "\
Write a brief summary of the book provided by the user, in markdown.

Use this structure:

### Summary

Two short paragraphs covering the premise, the main characters and the \
central themes, without revealing the ending.

#### Key Highlights

- Three to five bullet points on what makes the book notable.

#### Why It's Special

One paragraph on the book's lasting appeal and who it is for.";

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Source of a book's text.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Section orders of the book, in reading order.
    async fn sections(&self, book_id: &str) -> Result<Vec<i64>, HandlerError>;

    /// Plain text of one section.
    async fn section_text(&self, book_id: &str, order: i64) -> Result<String, HandlerError>;

    /// Narration length in seconds of each section that has metadata.
    async fn section_durations(&self, book_id: &str) -> Result<Vec<f64>, HandlerError>;
}

/// Language model that turns book text into a summary.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, HandlerError>;
}

/// Stand-in used when a collaborator has no configuration; every call
/// fails the job.
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl ContentSource for Unconfigured {
    async fn sections(&self, _book_id: &str) -> Result<Vec<i64>, HandlerError> {
        Err(HandlerError::NotConfigured(self.0))
    }

    async fn section_text(&self, _book_id: &str, _order: i64) -> Result<String, HandlerError> {
        Err(HandlerError::NotConfigured(self.0))
    }

    async fn section_durations(&self, _book_id: &str) -> Result<Vec<f64>, HandlerError> {
        Err(HandlerError::NotConfigured(self.0))
    }
}

#[async_trait]
impl SummaryModel for Unconfigured {
    async fn summarize(&self, _text: &str) -> Result<String, HandlerError> {
        Err(HandlerError::NotConfigured(self.0))
    }
}

// ---------------------------------------------------------------------------
// HTTP content service
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BookResponse {
    data: BookData,
}

#[derive(Debug, Deserialize)]
struct BookData {
    #[serde(default)]
    nav: Option<Vec<NavEntry>>,
}

#[derive(Debug, Deserialize)]
struct NavEntry {
    order: i64,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default)]
    properties: BlockProperties,
}

#[derive(Debug, Default, Deserialize)]
struct BlockProperties {
    #[serde(default)]
    text: Option<String>,
}

/// One `block_metadata` record; only `data.duration` is read.
#[derive(Debug, Deserialize)]
struct BlockMetadata {
    #[serde(default)]
    data: MetadataData,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataData {
    #[serde(default)]
    duration: Option<f64>,
}

/// Content service client.
///
/// `GET {base}/books/{id}` lists the navigation; `GET
/// {base}/books/{id}/sections/{order}/blocks` returns a section's blocks;
/// `GET {base}/books/{id}/metadata?type=section` returns per-section
/// metadata.
pub struct HttpContentSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpContentSource {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, HandlerError> {
        let mut request = self.client.get(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        check_status("content service", response).await
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn sections(&self, book_id: &str) -> Result<Vec<i64>, HandlerError> {
        let book: BookResponse = self.get(&format!("/books/{book_id}")).await?.json().await?;
        Ok(book
            .data
            .nav
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.order)
            .collect())
    }

    async fn section_text(&self, book_id: &str, order: i64) -> Result<String, HandlerError> {
        let blocks: Vec<Block> = self
            .get(&format!("/books/{book_id}/sections/{order}/blocks"))
            .await?
            .json()
            .await?;
        Ok(blocks
            .into_iter()
            .filter_map(|block| block.properties.text)
            .collect::<Vec<_>>()
            .join(" "))
    }

    async fn section_durations(&self, book_id: &str) -> Result<Vec<f64>, HandlerError> {
        let records: Vec<BlockMetadata> = self
            .get(&format!("/books/{book_id}/metadata?type=section"))
            .await?
            .json()
            .await?;
        Ok(records
            .into_iter()
            .map(|record| record.data.duration.unwrap_or(0.0))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible model
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat-completions client for summaries.
pub struct OpenAiSummaryModel {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSummaryModel {
    pub fn new(client: reqwest::Client, api_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl SummaryModel for OpenAiSummaryModel {
    async fn summarize(&self, text: &str) -> Result<String, HandlerError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SUMMARY_SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let chat: ChatResponse = check_status("language model", response).await?.json().await?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| HandlerError::Rejected("Language model returned no summary".into()))
    }
}

/// Turn a non-2xx response into [`HandlerError::Service`].
async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, HandlerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HandlerError::Service {
        service,
        status: status.as_u16(),
        body,
    })
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct BookSummaryHandler {
    store: Arc<dyn JobStore>,
    content: Arc<dyn ContentSource>,
    model: Arc<dyn SummaryModel>,
}

impl BookSummaryHandler {
    pub fn new(
        store: Arc<dyn JobStore>,
        content: Arc<dyn ContentSource>,
        model: Arc<dyn SummaryModel>,
    ) -> Self {
        Self {
            store,
            content,
            model,
        }
    }

    /// Wire up HTTP collaborators; unset ones fail jobs with
    /// [`HandlerError::NotConfigured`].
    pub fn from_config(config: &EngineConfig, store: Arc<dyn JobStore>, client: reqwest::Client) -> Self {
        let content: Arc<dyn ContentSource> = match &config.content_api_url {
            Some(url) => Arc::new(HttpContentSource::new(
                client.clone(),
                url.clone(),
                config.content_api_key.clone(),
            )),
            None => Arc::new(Unconfigured("CONTENT_API_URL")),
        };
        let model: Arc<dyn SummaryModel> = match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiSummaryModel::new(
                client,
                config.openai_api_url.clone(),
                key.clone(),
                config.summary_model.clone(),
            )),
            None => Arc::new(Unconfigured("OPENAI_API_KEY")),
        };
        Self::new(store, content, model)
    }

    async fn summarize(&self, job: &Job) -> Result<serde_json::Value, HandlerError> {
        let book_id = book_id(job)?;

        let sections = self.content.sections(&book_id).await?;
        if sections.is_empty() {
            return Err(HandlerError::Rejected("Book has no sections".into()));
        }

        let mut parts = Vec::with_capacity(sections.len());
        for order in sections {
            parts.push(self.content.section_text(&book_id, order).await?);
        }
        let text = parts.join("\n\n");
        if text.trim().is_empty() {
            return Err(HandlerError::Rejected("Book has no text".into()));
        }

        let duration: f64 = self.content.section_durations(&book_id).await?.into_iter().sum();

        tracing::debug!(
            job_id = job.id,
            %book_id,
            chars = text.len(),
            duration,
            "Requesting book summary",
        );
        let summary = self.model.summarize(&text).await?;

        let data = merge_data(&job.data, "duration", serde_json::json!(duration));
        Ok(merge_data(&data, "summary", serde_json::Value::String(summary)))
    }
}

/// The book to summarize: `data.book_id`, else the job's association.
fn book_id(job: &Job) -> Result<String, HandlerError> {
    job.data
        .get("book_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| job.book_id.clone())
        .ok_or_else(|| HandlerError::InvalidData("book_id is required".into()))
}

#[async_trait]
impl JobHandler for BookSummaryHandler {
    async fn handle(&self, job: Job) -> Result<JobOutcome, EngineError> {
        let result = self.summarize(&job).await;
        finish(self.store.as_ref(), job, result).await
    }
}
