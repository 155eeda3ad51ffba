//! In-memory implementations of the persistence traits.
//!
//! Used by tests and by local runs that have no PostgreSQL at hand.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use campaign_core::error::AppError;
use campaign_core::result::AppResult;
use campaign_entity::charge::ExpiredRetry;
use campaign_entity::job::{ExpiredParams, Job, JobStatus, NewJob, SortOrder};

use crate::store::{
    ChargeLedger, EVER_PAID_RESULTS, ExpiredRetrySource, JobStore, RECENT_PAID_RESULTS,
};

/// Job store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<i64, Job>,
    next_id: AtomicI64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job row as-is.
    pub fn insert(&self, job: Job) {
        self.next_id.fetch_max(job.id, Ordering::SeqCst);
        self.jobs.insert(job.id, job);
    }

    /// Current copy of a job row.
    pub fn snapshot(&self, id: i64) -> Option<Job> {
        self.jobs.get(&id).map(|j| j.value().clone())
    }

    fn not_found(id: i64) -> AppError {
        AppError::not_found(format!("Not found: {id}"))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: i64) -> AppResult<Job> {
        self.snapshot(id).ok_or_else(|| Self::not_found(id))
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|j| (j.run_at, j.id));
        Ok(jobs)
    }

    async fn create(&self, job: &NewJob) -> AppResult<Job> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = Job {
            id,
            user_id: job.user_id,
            created_at: Utc::now(),
            run_at: job.run_at,
            kind: job.kind,
            status: JobStatus::Ready,
            file_name: job.file_name.clone(),
            params: job.params.clone(),
            skip: None,
            log_path: None,
            finished_at: None,
        };
        self.jobs.insert(id, row.clone());
        Ok(row)
    }

    async fn transition_status(
        &self,
        id: i64,
        from: JobStatus,
        to: JobStatus,
    ) -> AppResult<bool> {
        let mut job = self.jobs.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        if job.status != from {
            return Ok(false);
        }
        job.status = to;
        Ok(true)
    }

    async fn set_status(&self, id: i64, status: JobStatus) -> AppResult<()> {
        let mut job = self.jobs.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        job.status = status;
        Ok(())
    }

    async fn set_skip(&self, id: i64, skip: i64) -> AppResult<bool> {
        let mut job = self.jobs.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        if job.skip.is_some_and(|current| current >= skip) {
            return Ok(false);
        }
        job.skip = Some(skip);
        job.finished_at = Some(Utc::now());
        Ok(true)
    }

    async fn set_log_path(&self, id: i64, path: &str) -> AppResult<()> {
        let mut job = self.jobs.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        job.log_path = Some(path.to_string());
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

/// One ledger transaction.
#[derive(Debug, Clone)]
struct LedgerEntry {
    result: String,
    sent_at: DateTime<Utc>,
}

/// Charge ledger backed by a map of msisdn to transactions.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: DashMap<String, Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction with the given result.
    pub fn record(&self, msisdn: &str, result: &str, sent_at: DateTime<Utc>) {
        self.entries
            .entry(msisdn.to_string())
            .or_default()
            .push(LedgerEntry {
                result: result.to_string(),
                sent_at,
            });
    }

    fn any(&self, msisdn: &str, pred: impl Fn(&LedgerEntry) -> bool) -> bool {
        self.entries
            .get(msisdn)
            .is_some_and(|entries| entries.iter().any(pred))
    }

    fn paid_since(&self, msisdn: &str, since: DateTime<Utc>) -> bool {
        self.any(msisdn, |e| {
            RECENT_PAID_RESULTS.contains(&e.result.as_str()) && e.sent_at > since
        })
    }

    fn ever_paid(&self, msisdn: &str) -> bool {
        self.any(msisdn, |e| EVER_PAID_RESULTS.contains(&e.result.as_str()))
    }
}

#[async_trait]
impl ChargeLedger for MemoryLedger {
    async fn has_paid_since(&self, msisdn: &str, since: DateTime<Utc>) -> AppResult<bool> {
        Ok(self.paid_since(msisdn, since))
    }

    async fn has_ever_paid(&self, msisdn: &str) -> AppResult<bool> {
        Ok(self.ever_paid(msisdn))
    }
}

/// Expired retry view held in memory, filtered against a [`MemoryLedger`]
/// the same way the SQL query filters against `transactions`.
#[derive(Debug)]
pub struct MemoryRetrySource {
    rows: DashMap<i64, ExpiredRetry>,
    ledger: Arc<MemoryLedger>,
}

impl MemoryRetrySource {
    pub fn new(ledger: Arc<MemoryLedger>) -> Self {
        Self {
            rows: DashMap::new(),
            ledger,
        }
    }

    pub fn insert(&self, row: ExpiredRetry) {
        self.rows.insert(row.retry_id, row);
    }
}

#[async_trait]
impl ExpiredRetrySource for MemoryRetrySource {
    async fn load_expired(
        &self,
        params: &ExpiredParams,
        after: Option<i64>,
    ) -> AppResult<Vec<ExpiredRetry>> {
        let mut matching: Vec<ExpiredRetry> = self
            .rows
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|r| params.date_from.is_none_or(|from| r.created_at > from))
            .filter(|r| params.date_to.is_none_or(|to| r.created_at < to))
            .filter(|r| {
                params
                    .service_code
                    .as_ref()
                    .is_none_or(|code| &r.service_code == code)
            })
            .filter(|r| {
                params
                    .campaign_id
                    .as_ref()
                    .is_none_or(|campaign| &r.campaign_id == campaign)
            })
            .filter(|r| !params.never || !self.ledger.ever_paid(&r.msisdn))
            .filter(|r| {
                params
                    .last_charge_at
                    .is_none_or(|since| !self.ledger.paid_since(&r.msisdn, since))
            })
            .collect();

        // DISTINCT ON (msisdn) ... ORDER BY msisdn, id <order>
        matching.sort_by(|a, b| {
            a.msisdn.cmp(&b.msisdn).then(match params.order {
                SortOrder::Asc => a.retry_id.cmp(&b.retry_id),
                SortOrder::Desc => b.retry_id.cmp(&a.retry_id),
            })
        });
        let mut seen = HashSet::new();
        matching.retain(|r| seen.insert(r.msisdn.clone()));

        matching.retain(|r| after.is_none_or(|after| r.retry_id > after));
        matching.sort_by_key(|r| r.retry_id);
        if let Some(count) = params.count {
            matching.truncate(count as usize);
        }
        Ok(matching)
    }
}
