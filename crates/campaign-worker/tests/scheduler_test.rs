//! End-to-end runs of the scheduler against in-memory stores.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;

use campaign_core::config::jobs::JobsConfig;
use campaign_core::error::ErrorKind;
use campaign_database::store::JobStore;
use campaign_database::{InMemoryJobStore, MemoryLedger, MemoryRetrySource};
use campaign_entity::charge::ExpiredRetry;
use campaign_entity::job::{Job, JobKind, JobStatus};
use campaign_queue::MemoryPublisher;
use campaign_worker::audit::{AuditAction, read_entries};
use campaign_worker::catalog::StaticServiceCatalog;
use campaign_worker::notifier::CompletionNotifier;
use campaign_worker::{JobContext, JobScheduler, PlannedPoller};

struct Harness {
    store: Arc<InMemoryJobStore>,
    ledger: Arc<MemoryLedger>,
    retries: Arc<MemoryRetrySource>,
    publisher: Arc<MemoryPublisher>,
    scheduler: Arc<JobScheduler>,
    dir: TempDir,
}

impl Harness {
    fn new(configure: impl FnOnce(&mut JobsConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = JobsConfig {
            injections_path: dir.path().join("injections").to_string_lossy().into_owned(),
            log_path: dir.path().join("logs").to_string_lossy().into_owned(),
            publish_retry_delay_ms: 5,
            shutdown_timeout_seconds: 2,
            ..JobsConfig::default()
        };
        configure(&mut config);
        std::fs::create_dir_all(&config.injections_path).unwrap();

        let store = Arc::new(InMemoryJobStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let retries = Arc::new(MemoryRetrySource::new(Arc::clone(&ledger)));
        let publisher = Arc::new(MemoryPublisher::new());
        let catalog = Arc::new(StaticServiceCatalog::default().with_service("290", 1500, "17"));

        let ctx = JobContext::new(
            store.clone(),
            ledger.clone(),
            retries.clone(),
            publisher.clone(),
            catalog,
            CompletionNotifier::disabled().unwrap(),
            config,
        );

        Self {
            store,
            ledger,
            retries,
            publisher,
            scheduler: Arc::new(JobScheduler::new(Arc::new(ctx))),
            dir,
        }
    }

    fn write_file(&self, name: &str, lines: &[&str]) {
        let path = self.dir.path().join("injections").join(name);
        std::fs::write(path, lines.join("\n")).unwrap();
    }

    fn write_bytes(&self, name: &str, bytes: &[u8]) {
        let path = self.dir.path().join("injections").join(name);
        std::fs::write(path, bytes).unwrap();
    }

    fn add_job(&self, id: i64, kind: JobKind, file_name: &str, params: &str) {
        let now = Utc::now();
        self.store.insert(Job {
            id,
            user_id: 1,
            created_at: now,
            run_at: now,
            kind,
            status: JobStatus::Ready,
            file_name: file_name.to_string(),
            params: params.to_string(),
            skip: None,
            log_path: None,
            finished_at: None,
        });
    }

    fn job(&self, id: i64) -> Job {
        self.store.snapshot(id).unwrap()
    }

    /// Reap until the registry is empty.
    async fn run_to_end(&self) {
        for _ in 0..500 {
            self.scheduler.reap().await;
            if self.scheduler.running_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("jobs did not finish");
    }

    async fn wait_for_rejection(&self) {
        for _ in 0..500 {
            if self.publisher.rejected() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("publisher never rejected");
    }

    async fn actions(&self, id: i64) -> Vec<AuditAction> {
        let path = self.job(id).log_path.expect("log path recorded");
        read_entries(Path::new(&path))
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }
}

fn retry_row(id: i64, msisdn: &str) -> ExpiredRetry {
    let created = Utc::now() - ChronoDuration::days(3);
    ExpiredRetry {
        retry_id: id,
        msisdn: msisdn.to_string(),
        tid: format!("old-{id}"),
        created_at: created,
        last_pay_attempt_at: created,
        attempts_count: 4,
        retry_days: 7,
        delay_hours: 24,
        price: 900,
        operator_code: 41001,
        country_code: 92,
        service_code: "290".to_string(),
        subscription_id: id * 10,
        campaign_id: "17".to_string(),
    }
}

const DUP_FILE: &[&str] = &["9230000001", "9230000001", "9230000002"];

#[tokio::test]
async fn test_dry_run_over_duplicated_file() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", DUP_FILE);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290","dry_run":1}"#);

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(2));
    assert!(job.finished_at.is_some());
    assert!(h.publisher.events().await.is_empty());
    assert_eq!(
        h.actions(1).await,
        vec![AuditAction::DryRun, AuditAction::Duplicate, AuditAction::DryRun]
    );
}

#[tokio::test]
async fn test_publishes_each_subscriber_once() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", DUP_FILE);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290","campaign_id":"99"}"#);

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(h.publisher.msisdns().await, vec!["9230000001", "9230000002"]);
    let events = h.publisher.events().await;
    assert_eq!(events[0].event_name, "charge");
    assert_eq!(events[0].event_data.price, 1500);
    assert_eq!(events[0].event_data.campaign_id, "99");
    assert_ne!(events[0].event_data.tid, events[1].event_data.tid);
    assert_eq!(h.job(1).status, JobStatus::Done);
}

#[tokio::test]
async fn test_invalid_numbers_are_skipped_not_fatal() {
    let h = Harness::new(|_| {});
    h.write_file(
        "base.txt",
        &["9230", "923000000000000000001", "8830000001", "  9230000005 "],
    );
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(h.publisher.msisdns().await, vec!["9230000005"]);
    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(3));
    assert_eq!(
        h.actions(1).await,
        vec![
            AuditAction::Invalid,
            AuditAction::Invalid,
            AuditAction::Invalid,
            AuditAction::Sent
        ]
    );
}

#[tokio::test]
async fn test_ledger_filters_skip_charged_subscribers() {
    let h = Harness::new(|_| {});
    let now = Utc::now();
    h.ledger.record("9230000001", "paid", now - ChronoDuration::hours(1));
    h.ledger.record("9230000002", "injection_paid", now - ChronoDuration::days(300));
    h.write_file("base.txt", &["9230000001", "9230000002", "9230000003"]);
    let since = (now - ChronoDuration::days(1)).to_rfc3339();
    h.add_job(
        1,
        JobKind::Injection,
        "base.txt",
        &format!(r#"{{"service_code":"290","never":"1","last_charge_at":"{since}"}}"#),
    );

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(h.publisher.msisdns().await, vec!["9230000003"]);
    assert_eq!(
        h.actions(1).await,
        vec![
            AuditAction::AlreadyCharged,
            AuditAction::AlreadyCharged,
            AuditAction::Sent
        ]
    );
}

#[tokio::test]
async fn test_stop_mid_file_then_resume_publishes_nothing_twice() {
    let h = Harness::new(|_| {});
    let lines = ["9230000001", "9230000002", "9230000003", "9230000004", "9230000005"];
    h.write_file("base.txt", &lines);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.publisher.fail_after(2);

    h.scheduler.start(1).await.unwrap();
    h.wait_for_rejection().await;
    h.scheduler.stop(1, JobStatus::Canceled).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stopped = h.job(1);
    assert_eq!(stopped.status, JobStatus::Canceled);
    assert_eq!(stopped.skip, Some(1));
    assert_eq!(h.publisher.msisdns().await.len(), 2);

    h.store.set_status(1, JobStatus::Ready).await.unwrap();
    h.publisher.recover();
    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(h.publisher.msisdns().await, lines.to_vec());
    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(4));
}

#[tokio::test]
async fn test_resume_remembers_subscribers_before_cursor() {
    let h = Harness::new(|_| {});
    h.write_file(
        "base.txt",
        &["9230000001", "9230000002", "9230000003", "9230000001"],
    );
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.publisher.fail_after(2);

    h.scheduler.start(1).await.unwrap();
    h.wait_for_rejection().await;
    h.scheduler.stop(1, JobStatus::Canceled).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.job(1).skip, Some(1));

    h.store.set_status(1, JobStatus::Ready).await.unwrap();
    h.publisher.recover();
    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(
        h.publisher.msisdns().await,
        vec!["9230000001", "9230000002", "9230000003"]
    );
    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(3));
}

#[tokio::test]
async fn test_corrupt_line_is_skipped_not_fatal() {
    let h = Harness::new(|_| {});
    h.write_bytes("base.txt", b"9230000001\n92300\xff00002\n9230000003\n");
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(h.publisher.msisdns().await, vec!["9230000001", "9230000003"]);
    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(2));
    assert_eq!(
        h.actions(1).await,
        vec![AuditAction::Sent, AuditAction::Invalid, AuditAction::Sent]
    );
}

#[tokio::test]
async fn test_resume_past_end_keeps_cursor() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", DUP_FILE);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.store.set_skip(1, 7).await.unwrap();

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert!(h.publisher.events().await.is_empty());
    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(7));
}

#[tokio::test]
async fn test_checkpoints_cursor_while_running() {
    let h = Harness::new(|config| config.checkpoint_every = 1);
    h.write_file("base.txt", &["9230000001", "9230000002", "9230000003"]);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.publisher.fail_after(2);

    h.scheduler.start(1).await.unwrap();
    h.wait_for_rejection().await;

    assert_eq!(h.job(1).skip, Some(1));
    let running = h.scheduler.status();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, 1);
    assert_eq!(running[0].skip, Some(1));
    assert_eq!(running[0].processed, 3);

    h.scheduler.stop(1, JobStatus::Canceled).await.unwrap();
    assert!(h.scheduler.status().is_empty());
}

#[tokio::test]
async fn test_count_limits_records_per_run() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", &["9230000001", "9230000002", "9230000003"]);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290","count":"2"}"#);

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(h.publisher.msisdns().await, vec!["9230000001", "9230000002"]);
    assert_eq!(h.job(1).skip, Some(1));
    assert_eq!(h.job(1).status, JobStatus::Done);
}

#[tokio::test]
async fn test_bounded_retry_fails_the_job() {
    let h = Harness::new(|config| config.publish_max_attempts = 2);
    h.write_file("base.txt", &["9230000001"]);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.publisher.fail_all();

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.skip, None);
    assert_eq!(h.publisher.rejected(), 2);
    assert_eq!(h.actions(1).await, vec![AuditAction::Error]);
}

#[tokio::test]
async fn test_concurrent_starts_admit_one() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", DUP_FILE);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);

    let (first, second) = tokio::join!(h.scheduler.start(1), h.scheduler.start(1));
    assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let err = first.err().or(second.err()).unwrap();
    assert_eq!(err.kind, ErrorKind::Conflict);

    h.run_to_end().await;
    assert_eq!(h.publisher.msisdns().await.len(), 2);
}

#[tokio::test]
async fn test_start_rejections() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", DUP_FILE);

    let err = h.scheduler.start(99).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.message, "Not found: 99");

    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.store.set_status(1, JobStatus::Done).await.unwrap();
    let err = h.scheduler.start(1).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.message, "Job status: done");

    h.add_job(2, JobKind::Injection, "base.txt", r#"{"dry_run":1}"#);
    let err = h.scheduler.start(2).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(h.job(2).status, JobStatus::Error);

    h.add_job(3, JobKind::Injection, "base.txt", r#"{"service_code":"404"}"#);
    let err = h.scheduler.start(3).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExternalService);
    assert_eq!(h.job(3).status, JobStatus::Ready);

    h.add_job(4, JobKind::Injection, "missing.txt", r#"{"service_code":"290"}"#);
    let err = h.scheduler.start(4).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Storage);
    assert_eq!(h.job(4).status, JobStatus::Error);

    assert_eq!(h.scheduler.running_count(), 0);
}

#[tokio::test]
async fn test_stop_unknown_job_is_not_found() {
    let h = Harness::new(|_| {});
    let err = h.scheduler.stop(5, JobStatus::Canceled).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_expired_never_excludes_paid_subscribers() {
    let h = Harness::new(|_| {});
    h.ledger.record("92301", "expired_paid", Utc::now() - ChronoDuration::days(40));
    h.retries.insert(retry_row(1, "92301"));
    h.retries.insert(retry_row(2, "92302"));
    h.retries.insert(retry_row(3, "92302"));
    h.add_job(1, JobKind::Expired, "", r#"{"never":1,"campaign_id":"17"}"#);

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    let events = h.publisher.events().await;
    assert_eq!(events.len(), 1);
    let record = &events[0].event_data;
    assert_eq!(record.msisdn, "92302");
    assert_eq!(record.retry_id, Some(2));
    assert_eq!(record.service_code, "290");
    assert_eq!(record.campaign_id, "17");
    assert_eq!(record.price, 900);

    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(2));
}

#[tokio::test]
async fn test_expired_count_resumes_after_cursor() {
    let h = Harness::new(|_| {});
    for id in 1..=5 {
        h.retries.insert(retry_row(id, &format!("9230{id}")));
    }
    h.add_job(1, JobKind::Expired, "", r#"{"count":2}"#);

    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;
    assert_eq!(h.publisher.msisdns().await, vec!["92301", "92302"]);
    assert_eq!(h.job(1).skip, Some(2));

    h.store.set_status(1, JobStatus::Ready).await.unwrap();
    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(
        h.publisher.msisdns().await,
        vec!["92301", "92302", "92303", "92304"]
    );
    let job = h.job(1);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.skip, Some(4));
}

#[tokio::test]
async fn test_expired_stop_then_resume() {
    let h = Harness::new(|_| {});
    for id in 1..=3 {
        h.retries.insert(retry_row(id, &format!("9230{id}")));
    }
    h.add_job(1, JobKind::Expired, "", "{}");
    h.publisher.fail_after(1);

    h.scheduler.start(1).await.unwrap();
    h.wait_for_rejection().await;
    h.scheduler.stop(1, JobStatus::Canceled).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stopped = h.job(1);
    assert_eq!(stopped.status, JobStatus::Canceled);
    assert_eq!(stopped.skip, Some(1));

    h.store.set_status(1, JobStatus::Ready).await.unwrap();
    h.publisher.recover();
    h.scheduler.start(1).await.unwrap();
    h.run_to_end().await;

    assert_eq!(h.publisher.msisdns().await, vec!["92301", "92302", "92303"]);
    assert_eq!(h.job(1).skip, Some(3));
    assert_eq!(h.job(1).status, JobStatus::Done);
}

#[tokio::test]
async fn test_shutdown_cancels_running_jobs() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", DUP_FILE);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.add_job(2, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.publisher.fail_all();

    h.scheduler.start(1).await.unwrap();
    h.wait_for_rejection().await;
    h.scheduler.shutdown().await;

    assert_eq!(h.job(1).status, JobStatus::Canceled);
    assert_eq!(h.scheduler.running_count(), 0);

    let err = h.scheduler.start(2).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(h.job(2).status, JobStatus::Ready);
}

#[tokio::test]
async fn test_poller_starts_only_due_jobs() {
    let h = Harness::new(|_| {});
    h.write_file("base.txt", DUP_FILE);
    h.add_job(1, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);
    h.add_job(2, JobKind::Injection, "base.txt", r#"{"service_code":"290"}"#);

    let mut due = h.job(1);
    due.run_at = Utc::now() - ChronoDuration::minutes(5);
    h.store.insert(due);
    let mut later = h.job(2);
    later.run_at = Utc::now() + ChronoDuration::hours(1);
    h.store.insert(later);

    let poller = PlannedPoller::new(Arc::clone(&h.scheduler), Duration::from_secs(60), 10);
    assert_eq!(poller.poll_once().await, 1);
    h.run_to_end().await;

    assert_eq!(h.job(1).status, JobStatus::Done);
    assert_eq!(h.job(2).status, JobStatus::Ready);
}
