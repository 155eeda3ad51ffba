//! Job entity model.

use campaign_core::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::params::JobParams;
use super::status::{JobKind, JobStatus};

/// A charge campaign job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: i64,
    /// Creator of the job (informational).
    pub user_id: i64,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the planned poller may start the job.
    pub run_at: DateTime<Utc>,
    /// Campaign kind.
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: JobKind,
    /// Current job status.
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    /// Injection file, relative to the injections directory.
    pub file_name: String,
    /// Raw JSON parameters.
    pub params: String,
    /// Position of the last handled candidate, `None` until something was
    /// processed.
    pub skip: Option<i64>,
    /// Audit log of the last run.
    pub log_path: Option<String>,
    /// When the cursor was last persisted.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Parse the raw `params` according to the job kind.
    pub fn parse_params(&self) -> Result<JobParams, AppError> {
        JobParams::parse(self.kind, &self.params)
    }

    /// Whether the job may be started by the planned poller at `now`.
    pub fn is_due(&self, now: DateTime<Utc>, grace_seconds: i64) -> bool {
        self.status == JobStatus::Ready && (now - self.run_at).num_seconds() > grace_seconds
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub user_id: i64,
    pub run_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: JobKind,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub params: String,
}
