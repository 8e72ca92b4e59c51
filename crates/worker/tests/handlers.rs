//! HTTP-backed handlers against mock services.

use std::sync::Arc;

use assert_matches::assert_matches;
use blockjobs_core::job::{Job, JobStatus, JobType, LogEntry, MSG_CREATED};
use blockjobs_worker::handlers::book_summary::{
    ContentSource, HttpContentSource, OpenAiSummaryModel, SummaryModel, SUMMARY_SYSTEM_PROMPT,
};
use blockjobs_worker::handlers::{BookSummaryHandler, HandlerError, RemoteTaskHandler};
use blockjobs_worker::store::MemoryJobStore;
use blockjobs_worker::{EngineError, JobHandler};
use chrono::Utc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn started(id: i64, job_type: &str, data: serde_json::Value) -> Job {
    Job {
        id,
        job_type: job_type.into(),
        status: JobStatus::Pending,
        dependencies: Vec::new(),
        log: vec![LogEntry::now(MSG_CREATED)],
        data,
        book_id: Some("book-9".into()),
        created_at: None,
        updated_at: None,
    }
    .start_processing(Utc::now())
}

fn remote(
    job_type: JobType,
    endpoint: Option<String>,
    store: Arc<MemoryJobStore>,
) -> RemoteTaskHandler {
    RemoteTaskHandler::new(job_type, endpoint, store, reqwest::Client::new())
}

// ---------------------------------------------------------------------------
// Remote task endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remote_success_stores_response_under_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .and(body_partial_json(serde_json::json!({ "id": 1, "type": "transcription" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "words": 120 })))
        .expect(1)
        .mount(&server)
        .await;

    let job = started(1, "transcription", serde_json::json!({ "audio": "a.mp3" }));
    let store = Arc::new(MemoryJobStore::with_jobs([job.clone()]));
    let handler = remote(
        JobType::Transcription,
        Some(format!("{}/transcribe", server.uri())),
        store.clone(),
    );

    let outcome = handler.handle(job).await.unwrap();

    assert!(outcome.is_dispatched());
    let stored = store.get(1).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(
        stored.data,
        serde_json::json!({ "audio": "a.mp3", "result": { "words": 120 } })
    );
}

#[tokio::test]
async fn remote_success_without_json_keeps_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let job = started(2, "indexing", serde_json::json!({ "index": "books" }));
    let store = Arc::new(MemoryJobStore::with_jobs([job.clone()]));
    let handler = remote(JobType::Indexing, Some(server.uri()), store.clone());

    handler.handle(job).await.unwrap();

    let stored = store.get(2).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.data, serde_json::json!({ "index": "books" }));
}

#[tokio::test]
async fn remote_error_status_fails_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unsupported format"))
        .mount(&server)
        .await;

    let job = started(3, "transcription", serde_json::json!({}));
    let store = Arc::new(MemoryJobStore::with_jobs([job.clone()]));
    let handler = remote(JobType::Transcription, Some(server.uri()), store.clone());

    let outcome = handler.handle(job).await.unwrap();

    assert_eq!(
        outcome.message.as_deref(),
        Some("Job failed: task endpoint returned HTTP 422: unsupported format")
    );
    assert_eq!(store.get(3).await.unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn remote_without_endpoint_fails_the_job() {
    let job = started(4, "indexing", serde_json::json!({}));
    let store = Arc::new(MemoryJobStore::with_jobs([job.clone()]));
    let handler = remote(JobType::Indexing, None, store.clone());

    let outcome = handler.handle(job).await.unwrap();

    assert_eq!(
        outcome.message.as_deref(),
        Some("Job failed: INDEXING_ENDPOINT is not configured")
    );
    assert_eq!(store.get(4).await.unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn unreachable_endpoint_propagates_and_leaves_job_processing() {
    let job = started(5, "indexing", serde_json::json!({}));
    let store = Arc::new(MemoryJobStore::with_jobs([job.clone()]));
    // Nothing listens on port 1.
    let handler = remote(
        JobType::Indexing,
        Some("http://127.0.0.1:1/index".into()),
        store.clone(),
    );

    let result = handler.handle(job).await;

    assert_matches!(result, Err(EngineError::Transport(_)));
    assert_eq!(store.get(5).await.unwrap().status, JobStatus::Processing);
    assert!(store.writes().await.is_empty());
}

// ---------------------------------------------------------------------------
// Content service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn content_source_reads_nav_and_joins_block_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/book-9"))
        .and(header("authorization", "Bearer content-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "title": "Moby-Dick", "nav": [{ "order": 2 }, { "order": 5 }] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/books/book-9/sections/2/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "properties": { "text": "Call me" } },
            { "properties": {} },
            { "properties": { "text": "Ishmael." } }
        ])))
        .mount(&server)
        .await;

    let source = HttpContentSource::new(
        reqwest::Client::new(),
        format!("{}/", server.uri()),
        Some("content-key".into()),
    );

    assert_eq!(source.sections("book-9").await.unwrap(), vec![2, 5]);
    assert_eq!(source.section_text("book-9", 2).await.unwrap(), "Call me Ishmael.");
}

#[tokio::test]
async fn content_source_reads_section_durations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/book-9/metadata"))
        .and(query_param("type", "section"))
        .and(header("authorization", "Bearer content-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "block_id": "s1", "data": { "duration": 95.25 } },
            { "block_id": "s2", "data": {} },
            { "block_id": "s3", "data": { "duration": 30 } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpContentSource::new(
        reqwest::Client::new(),
        server.uri(),
        Some("content-key".into()),
    );

    assert_eq!(
        source.section_durations("book-9").await.unwrap(),
        vec![95.25, 0.0, 30.0]
    );
}

#[tokio::test]
async fn content_source_missing_nav_means_no_sections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": {} })))
        .mount(&server)
        .await;

    let source = HttpContentSource::new(reqwest::Client::new(), server.uri(), None);

    assert!(source.sections("empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn content_source_error_status_is_a_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such book"))
        .mount(&server)
        .await;

    let source = HttpContentSource::new(reqwest::Client::new(), server.uri(), None);

    assert_matches!(
        source.sections("missing").await,
        Err(HandlerError::Service { status: 404, .. })
    );
}

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

#[tokio::test]
async fn model_sends_system_prompt_and_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": SUMMARY_SYSTEM_PROMPT },
                { "role": "user", "content": "Whole book." }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "### Summary\n\nShort." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = OpenAiSummaryModel::new(
        reqwest::Client::new(),
        format!("{}/v1", server.uri()),
        "sk-test".into(),
        "gpt-4o-mini".into(),
    );

    assert_eq!(model.summarize("Whole book.").await.unwrap(), "### Summary\n\nShort.");
}

#[tokio::test]
async fn model_without_choices_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&server)
        .await;

    let model = OpenAiSummaryModel::new(
        reqwest::Client::new(),
        server.uri(),
        "sk-test".into(),
        "gpt-4o-mini".into(),
    );

    assert_matches!(
        model.summarize("text").await,
        Err(HandlerError::Rejected(msg)) if msg == "Language model returned no summary"
    );
}

// ---------------------------------------------------------------------------
// Book summary end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn book_summary_handler_uses_both_services() {
    let content = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/book-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "nav": [{ "order": 1 }, { "order": 2 }] }
        })))
        .mount(&content)
        .await;
    Mock::given(method("GET"))
        .and(path("/books/book-9/sections/1/blocks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "properties": { "text": "One." } }])),
        )
        .mount(&content)
        .await;
    Mock::given(method("GET"))
        .and(path("/books/book-9/sections/2/blocks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "properties": { "text": "Two." } }])),
        )
        .mount(&content)
        .await;
    Mock::given(method("GET"))
        .and(path("/books/book-9/metadata"))
        .and(query_param("type", "section"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "data": { "duration": 42.5 } },
            { "data": { "duration": 17.5 } }
        ])))
        .mount(&content)
        .await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "messages": [{ "role": "system" }, { "role": "user", "content": "One.\n\nTwo." }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "A tale in two parts." } }]
        })))
        .expect(1)
        .mount(&llm)
        .await;

    let job = started(6, "book_summary", serde_json::json!({}));
    let store = Arc::new(MemoryJobStore::with_jobs([job.clone()]));
    let client = reqwest::Client::new();
    let handler = BookSummaryHandler::new(
        store.clone(),
        Arc::new(HttpContentSource::new(client.clone(), content.uri(), None)),
        Arc::new(OpenAiSummaryModel::new(
            client,
            llm.uri(),
            "sk-test".into(),
            "gpt-4o-mini".into(),
        )),
    );

    let outcome = handler.handle(job).await.unwrap();

    assert!(outcome.is_dispatched());
    let stored = store.get(6).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.data["summary"], "A tale in two parts.");
    assert_eq!(stored.data["duration"], 60.0);
}
