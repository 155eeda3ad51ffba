//! Integration tests for the job control endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use campaign_api::{AppState, build_router};
use campaign_core::config::jobs::JobsConfig;
use campaign_database::{InMemoryJobStore, MemoryLedger, MemoryRetrySource};
use campaign_entity::job::{Job, JobKind, JobStatus};
use campaign_queue::MemoryPublisher;
use campaign_worker::catalog::StaticServiceCatalog;
use campaign_worker::notifier::CompletionNotifier;
use campaign_worker::{JobContext, JobScheduler};

/// Test application context
struct TestApp {
    router: Router,
    store: Arc<InMemoryJobStore>,
    publisher: Arc<MemoryPublisher>,
    scheduler: Arc<JobScheduler>,
    dir: TempDir,
}

struct TestResponse {
    status: StatusCode,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = JobsConfig {
            injections_path: dir.path().to_string_lossy().into_owned(),
            log_path: dir.path().join("logs").to_string_lossy().into_owned(),
            publish_retry_delay_ms: 5,
            ..JobsConfig::default()
        };

        let store = Arc::new(InMemoryJobStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let retries = Arc::new(MemoryRetrySource::new(Arc::clone(&ledger)));
        let publisher = Arc::new(MemoryPublisher::new());
        let ctx = JobContext::new(
            store.clone(),
            ledger,
            retries,
            publisher.clone(),
            Arc::new(StaticServiceCatalog::default().with_service("290", 1500, "17")),
            CompletionNotifier::disabled().unwrap(),
            config,
        );
        let scheduler = Arc::new(JobScheduler::new(Arc::new(ctx)));
        let router = build_router(AppState::new(Arc::clone(&scheduler), "jobs"));

        Self {
            router,
            store,
            publisher,
            scheduler,
            dir,
        }
    }

    fn add_injection_job(&self, id: i64, lines: &[&str]) {
        let file_name = format!("job_{id}.txt");
        std::fs::write(self.dir.path().join(&file_name), lines.join("\n")).unwrap();
        let now = Utc::now();
        self.store.insert(Job {
            id,
            user_id: 1,
            created_at: now,
            run_at: now,
            kind: JobKind::Injection,
            status: JobStatus::Ready,
            file_name,
            params: r#"{"service_code":"290"}"#.to_string(),
            skip: None,
            log_path: None,
            finished_at: None,
        });
    }

    async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, body }
    }

    async fn wait_until_reaped(&self) {
        for _ in 0..500 {
            self.scheduler.reap().await;
            if self.scheduler.running_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("jobs did not finish");
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["app"], "jobs");
    assert_eq!(response.body["database"], "connected");
    assert_eq!(response.body["queue"], "connected");
    assert_eq!(response.body["running_jobs"], 0);
}

#[tokio::test]
async fn test_health_reports_unreachable_queue() {
    let app = TestApp::new();
    app.publisher.fail_all();

    let response = app.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "degraded");
    assert_eq!(response.body["database"], "connected");
    assert_eq!(response.body["queue"], "unavailable");
}

#[tokio::test]
async fn test_start_runs_job_to_done() {
    let app = TestApp::new();
    app.add_injection_job(1, &["9230000001", "9230000002"]);

    let response = app.get("/jobs/start?id=1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, serde_json::json!({}));

    app.wait_until_reaped().await;
    assert_eq!(app.publisher.msisdns().await.len(), 2);
    assert_eq!(app.store.snapshot(1).unwrap().status, JobStatus::Done);
}

#[tokio::test]
async fn test_start_errors_are_500_with_message() {
    let app = TestApp::new();

    let response = app.get("/jobs/start").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "id required");

    let response = app.get("/jobs/start?id=abc").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"].as_str().unwrap().contains("abc"));

    let response = app.get("/jobs/start?id=404").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "Not found: 404");
}

#[tokio::test]
async fn test_status_then_stop() {
    let app = TestApp::new();
    app.add_injection_job(3, &["9230000001", "9230000002"]);
    app.publisher.fail_all();

    assert_eq!(app.get("/jobs/start?id=3").await.status, StatusCode::OK);

    let response = app.get("/jobs/status").await;
    assert_eq!(response.status, StatusCode::OK);
    let jobs = response.body.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], 3);
    assert_eq!(jobs[0]["type"], "injection");
    assert_eq!(jobs[0]["file_name"], "job_3.txt");

    let response = app.get("/jobs/stop?id=3").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.store.snapshot(3).unwrap().status, JobStatus::Canceled);

    let response = app.get("/jobs/stop?id=3").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "Not found: 3");

    let response = app.get("/jobs/status").await;
    assert_eq!(response.body, serde_json::json!([]));
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let app = TestApp::new();
    app.add_injection_job(4, &["9230000001"]);
    app.publisher.fail_all();

    assert_eq!(app.get("/jobs/start?id=4").await.status, StatusCode::OK);
    let response = app.get("/jobs/start?id=4").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"].as_str().unwrap().contains("already running"));

    app.get("/jobs/stop?id=4").await;
}
