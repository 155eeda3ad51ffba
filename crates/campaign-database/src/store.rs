//! Persistence traits the scheduler runs against.
//!
//! Each trait has a PostgreSQL implementation in [`crate::repositories`]
//! and an in-memory one in [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use campaign_core::result::AppResult;
use campaign_entity::charge::ExpiredRetry;
use campaign_entity::job::{ExpiredParams, Job, JobStatus, NewJob};

/// Ledger results that count as a successful charge for the
/// `last_charge_at` filter.
pub const RECENT_PAID_RESULTS: &[&str] = &["paid", "retry_paid"];

/// Ledger results that count as a successful charge for the `never`
/// filter.
pub const EVER_PAID_RESULTS: &[&str] = &["paid", "retry_paid", "injection_paid", "expired_paid"];

/// Durable storage of campaign jobs.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Load a job by id. Returns a `NotFound` error if it does not exist.
    async fn get(&self, id: i64) -> AppResult<Job>;

    /// List jobs in the given status.
    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>>;

    /// Insert a new job in `ready` status.
    async fn create(&self, job: &NewJob) -> AppResult<Job>;

    /// Move a job from `from` to `to` only if it is currently in `from`.
    /// Returns whether the row was updated.
    async fn transition_status(&self, id: i64, from: JobStatus, to: JobStatus)
    -> AppResult<bool>;

    /// Unconditionally set the status of a job.
    async fn set_status(&self, id: i64, status: JobStatus) -> AppResult<()>;

    /// Persist the cursor if it moves forward, stamping `finished_at`.
    /// Returns whether the stored cursor changed.
    async fn set_skip(&self, id: i64, skip: i64) -> AppResult<bool>;

    /// Record where the job's audit log is written.
    async fn set_log_path(&self, id: i64, path: &str) -> AppResult<()>;

    /// Check that the backing store answers queries.
    async fn health_check(&self) -> AppResult<bool>;
}

/// Point lookups against the charge transaction ledger.
#[async_trait]
pub trait ChargeLedger: Send + Sync + std::fmt::Debug + 'static {
    /// Whether the subscriber had a `paid`/`retry_paid` transaction sent
    /// after `since`.
    async fn has_paid_since(&self, msisdn: &str, since: DateTime<Utc>) -> AppResult<bool>;

    /// Whether the subscriber was ever charged successfully.
    async fn has_ever_paid(&self, msisdn: &str) -> AppResult<bool>;
}

/// Filtered read of the expired retry view.
#[async_trait]
pub trait ExpiredRetrySource: Send + Sync + std::fmt::Debug + 'static {
    /// Load at most one row per subscriber matching `params`, ordered by
    /// retry id ascending. Rows at or before `after` are left out before
    /// `params.count` is applied.
    async fn load_expired(
        &self,
        params: &ExpiredParams,
        after: Option<i64>,
    ) -> AppResult<Vec<ExpiredRetry>>;
}
