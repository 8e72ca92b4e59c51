//! Integration tests for `JobRepo` against a real database.
//!
//! Run with `DATABASE_URL` pointing at a disposable PostgreSQL instance:
//! `cargo test -p blockjobs-db -- --ignored`.

use blockjobs_core::job::{Job, JobStatus, NewJob, MSG_CREATED};
use blockjobs_db::repositories::JobRepo;
use chrono::Utc;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_job(dependencies: Vec<i64>) -> NewJob {
    NewJob {
        job_type: "book_summary".to_string(),
        dependencies,
        data: serde_json::json!({ "book_id": "b-1" }),
        book_id: Some("b-1".to_string()),
    }
}

async fn create(pool: &PgPool, dependencies: Vec<i64>) -> Job {
    let row = JobRepo::create(pool, &new_job(dependencies)).await.unwrap();
    Job::try_from(row).unwrap()
}

async fn set_status(pool: &PgPool, job: Job, status: JobStatus) -> Job {
    let next = job.transition(status, "test transition");
    assert!(JobRepo::replace(pool, &next).await.unwrap());
    next
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn create_starts_pending_with_creation_entry(pool: PgPool) {
    let job = create(&pool, vec![]).await;

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.log.len(), 1);
    assert_eq!(job.log[0].message, MSG_CREATED);
    assert_eq!(job.book_id.as_deref(), Some("b-1"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn fetch_many_skips_unknown_ids(pool: PgPool) {
    let a = create(&pool, vec![]).await;
    let b = create(&pool, vec![]).await;

    let rows = JobRepo::fetch_many(&pool, &[a.id, 999_999, b.id]).await.unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn replace_unknown_id_reports_missing(pool: PgPool) {
    let mut job = create(&pool, vec![]).await;
    job.id = 999_999;
    assert!(!JobRepo::replace(&pool, &job).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn admit_only_once(pool: PgPool) {
    let job = create(&pool, vec![]).await;
    let started = job.start_processing(Utc::now());

    assert!(JobRepo::admit(&pool, &started).await.unwrap());
    assert!(!JobRepo::admit(&pool, &started).await.unwrap());

    let stored = JobRepo::find_by_id(&pool, started.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "PROCESSING");
    assert_eq!(stored.log.0.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn admit_requires_completed_dependencies(pool: PgPool) {
    let dep = create(&pool, vec![]).await;
    let job = create(&pool, vec![dep.id]).await;
    let started = job.clone().start_processing(Utc::now());

    assert!(!JobRepo::admit(&pool, &started).await.unwrap());

    set_status(&pool, dep, JobStatus::Completed).await;
    assert!(JobRepo::admit(&pool, &started).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn admit_treats_missing_dependency_as_unmet(pool: PgPool) {
    let job = create(&pool, vec![424_242]).await;
    let started = job.start_processing(Utc::now());
    assert!(!JobRepo::admit(&pool, &started).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn list_by_status_filters(pool: PgPool) {
    let a = create(&pool, vec![]).await;
    let _b = create(&pool, vec![]).await;
    set_status(&pool, a.clone(), JobStatus::Processing).await;

    let rows = JobRepo::list_by_status(&pool, JobStatus::Processing)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, a.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn resolve_orphan_skips_job_finished_after_read(pool: PgPool) {
    let job = create(&pool, vec![]).await;
    let running = set_status(&pool, job, JobStatus::Processing).await;
    let seen = running.log.len() as i64;
    let requeued = running.clone().transition(JobStatus::Pending, "requeued");

    set_status(&pool, running, JobStatus::Completed).await;
    assert!(!JobRepo::resolve_orphan(&pool, &requeued, seen).await.unwrap());

    let stored = JobRepo::find_by_id(&pool, requeued.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed.as_str());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn resolve_orphan_writes_untouched_processing_job(pool: PgPool) {
    let job = create(&pool, vec![]).await;
    let running = set_status(&pool, job, JobStatus::Processing).await;
    let seen = running.log.len() as i64;
    let failed = running.transition(JobStatus::Failed, "quarantined");

    assert!(JobRepo::resolve_orphan(&pool, &failed, seen).await.unwrap());
    assert!(!JobRepo::resolve_orphan(&pool, &failed, seen).await.unwrap());
}
