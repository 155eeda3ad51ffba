//! Registry of running jobs.
//!
//! Whoever removes an entry from the registry owns its finalization: a
//! stop request, the reaper, or shutdown. Runners only flag themselves as
//! finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

use campaign_entity::job::{Job, JobKind, JobParams, JobStatus};

const NO_CURSOR: i64 = -1;

/// Control state shared between the registry and one runner.
#[derive(Debug)]
pub struct JobControl {
    stop_requested: AtomicBool,
    finished: AtomicBool,
    status: AtomicU8,
    cursor: AtomicI64,
    processed: AtomicU64,
}

impl JobControl {
    /// Start from the persisted cursor.
    pub fn new(skip: Option<i64>) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            status: AtomicU8::new(u8::from(JobStatus::Done)),
            cursor: AtomicI64::new(skip.unwrap_or(NO_CURSOR)),
            processed: AtomicU64::new(0),
        }
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Record the final status and flag the run as over.
    pub fn finish(&self, status: JobStatus) {
        self.status.store(u8::from(status), Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Status computed by the runner, `done` unless it said otherwise.
    pub fn final_status(&self) -> JobStatus {
        JobStatus::try_from(self.status.load(Ordering::SeqCst)).unwrap_or(JobStatus::Done)
    }

    /// Move the cursor forward; never backwards.
    pub fn advance(&self, position: i64) {
        self.cursor.fetch_max(position, Ordering::SeqCst);
    }

    pub fn cursor(&self) -> Option<i64> {
        let cursor = self.cursor.load(Ordering::SeqCst);
        (cursor > NO_CURSOR).then_some(cursor)
    }

    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }
}

/// A job that has been started and not yet finalized.
#[derive(Debug, Clone)]
pub struct RunningJob {
    pub job: Job,
    pub params: JobParams,
    pub control: Arc<JobControl>,
    pub started_at: DateTime<Utc>,
}

/// Read-only view of a running job, as returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunningJobSnapshot {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    pub file_name: String,
    pub params: String,
    pub parsed_params: JobParams,
    pub run_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub skip: Option<i64>,
    pub processed: u64,
    pub stop_requested: bool,
}

impl From<&RunningJob> for RunningJobSnapshot {
    fn from(running: &RunningJob) -> Self {
        let control = &running.control;
        Self {
            id: running.job.id,
            user_id: running.job.user_id,
            kind: running.job.kind,
            status: if control.is_finished() {
                control.final_status()
            } else {
                JobStatus::InProgress
            },
            file_name: running.job.file_name.clone(),
            params: running.job.params.clone(),
            parsed_params: running.params.clone(),
            run_at: running.job.run_at,
            started_at: running.started_at,
            skip: control.cursor(),
            processed: control.processed(),
            stop_requested: control.stop_requested(),
        }
    }
}

/// Concurrent map of job id to running job.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<i64, RunningJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Insert unless the id is already present.
    pub fn try_insert(&self, running: RunningJob) -> bool {
        match self.jobs.entry(running.job.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(running);
                true
            }
        }
    }

    /// Remove an entry, taking over its finalization.
    pub fn claim(&self, id: i64) -> Option<RunningJob> {
        self.jobs.remove(&id).map(|(_, running)| running)
    }

    /// Claim every entry whose runner has finished.
    pub fn claim_finished(&self) -> Vec<RunningJob> {
        let finished: Vec<i64> = self
            .jobs
            .iter()
            .filter(|entry| entry.control.is_finished())
            .map(|entry| *entry.key())
            .collect();
        finished.into_iter().filter_map(|id| self.claim(id)).collect()
    }

    /// Claim every entry regardless of state.
    pub fn claim_all(&self) -> Vec<RunningJob> {
        let ids: Vec<i64> = self.jobs.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter_map(|id| self.claim(id)).collect()
    }

    /// Snapshots ordered by job id.
    pub fn snapshot(&self) -> Vec<RunningJobSnapshot> {
        let mut snapshots: Vec<RunningJobSnapshot> = self
            .jobs
            .iter()
            .map(|entry| RunningJobSnapshot::from(entry.value()))
            .collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(id: i64) -> RunningJob {
        let now = Utc::now();
        let job = Job {
            id,
            user_id: 1,
            created_at: now,
            run_at: now,
            kind: JobKind::Injection,
            status: JobStatus::InProgress,
            file_name: "base.txt".to_string(),
            params: r#"{"service_code":"290"}"#.to_string(),
            skip: Some(4),
            log_path: None,
            finished_at: None,
        };
        let params = JobParams::parse(job.kind, &job.params).unwrap();
        RunningJob {
            control: Arc::new(JobControl::new(job.skip)),
            job,
            params,
            started_at: now,
        }
    }

    #[test]
    fn test_cursor_only_moves_forward() {
        let control = JobControl::new(None);
        assert_eq!(control.cursor(), None);
        control.advance(3);
        control.advance(1);
        assert_eq!(control.cursor(), Some(3));

        let resumed = JobControl::new(Some(0));
        assert_eq!(resumed.cursor(), Some(0));
    }

    #[test]
    fn test_final_status_defaults_to_done() {
        let control = JobControl::new(None);
        assert_eq!(control.final_status(), JobStatus::Done);
        control.finish(JobStatus::Canceled);
        assert!(control.is_finished());
        assert_eq!(control.final_status(), JobStatus::Canceled);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let registry = JobRegistry::new();
        assert!(registry.try_insert(running(1)));
        assert!(!registry.try_insert(running(1)));
        assert!(registry.try_insert(running(2)));

        assert!(registry.claim(1).is_some());
        assert!(registry.claim(1).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_claim_finished_leaves_running_entries() {
        let registry = JobRegistry::new();
        registry.try_insert(running(1));
        let second = running(2);
        second.control.finish(JobStatus::Error);
        registry.try_insert(second);

        let claimed = registry.claim_finished();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].job.id, 2);
        assert!(registry.contains(1));
    }

    #[test]
    fn test_snapshot_reports_progress() {
        let registry = JobRegistry::new();
        let job = running(5);
        job.control.advance(9);
        job.control.record_processed();
        registry.try_insert(job);
        registry.try_insert(running(3));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.iter().map(|s| s.id).collect::<Vec<_>>(), vec![3, 5]);
        assert_eq!(snapshot[1].skip, Some(9));
        assert_eq!(snapshot[1].processed, 1);
        assert_eq!(snapshot[1].status, JobStatus::InProgress);

        let json = serde_json::to_value(&snapshot[1]).unwrap();
        assert_eq!(json["type"], "injection");
        assert_eq!(json["status"], "in progress");
    }
}
