#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use blockjobs_api::config::ServerConfig;
use blockjobs_api::router::build_app_router;
use blockjobs_api::state::AppState;
use blockjobs_core::job::{Job, JobStatus, LogEntry, MSG_CREATED};
use blockjobs_core::orphan::OrphanPolicy;
use blockjobs_core::outcome::JobOutcome;
use blockjobs_worker::handlers::finish;
use blockjobs_worker::store::MemoryJobStore;
use blockjobs_worker::{BatchExecutor, EngineError, JobHandler, JobRouter, JobStore, Reconciler};
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Handler that completes every job it receives, keeping its data.
pub struct CompletingHandler {
    store: Arc<dyn JobStore>,
}

#[async_trait]
impl JobHandler for CompletingHandler {
    async fn handle(&self, job: Job) -> Result<JobOutcome, EngineError> {
        let data = job.data.clone();
        finish(self.store.as_ref(), job, Ok(data)).await
    }
}

/// Full application over an in-memory store, with every job type
/// completed immediately and orphans quarantined after one hour.
pub fn build_test_app(store: Arc<MemoryJobStore>) -> Router {
    build_test_app_with(store, OrphanPolicy::Fail, chrono::Duration::hours(1))
}

pub fn build_test_app_with(
    store: Arc<MemoryJobStore>,
    policy: OrphanPolicy,
    orphan_timeout: chrono::Duration,
) -> Router {
    let store: Arc<dyn JobStore> = store;
    let handler: Arc<dyn JobHandler> = Arc::new(CompletingHandler {
        store: Arc::clone(&store),
    });
    let mut builder = JobRouter::builder();
    for job_type in blockjobs_core::job::JobType::ALL {
        builder = builder.register(job_type, Arc::clone(&handler));
    }
    let router = builder.build().unwrap();

    let state = AppState {
        store: Arc::clone(&store),
        executor: BatchExecutor::new(Arc::clone(&store), Arc::new(router)),
        reconciler: Arc::new(Reconciler::new(Arc::clone(&store), policy, orphan_timeout)),
        config: Arc::new(test_config()),
    };

    build_app_router(state, &test_config())
}

pub fn job(id: i64, job_type: &str, status: JobStatus, dependencies: Vec<i64>) -> Job {
    Job {
        id,
        job_type: job_type.into(),
        status,
        dependencies,
        log: vec![LogEntry::now(MSG_CREATED)],
        data: serde_json::json!({}),
        book_id: None,
        created_at: None,
        updated_at: None,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, body).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
