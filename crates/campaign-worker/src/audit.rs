//! Per-job audit log.
//!
//! Every decision the runner takes about a record is appended as one JSON
//! line to `<jobs.log_path>/job_<id>_<unix>.log`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Sent,
    DryRun,
    Invalid,
    AlreadyCharged,
    Duplicate,
    Error,
}

/// One audit line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub time: DateTime<Utc>,
    pub job_id: i64,
    /// Line index or retry id.
    pub position: i64,
    pub msisdn: String,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only JSON-lines writer owned by one runner.
#[derive(Debug)]
pub struct AuditLog {
    job_id: i64,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl AuditLog {
    /// Create the log directory if needed and open a fresh log file.
    pub async fn create(dir: &str, job_id: i64) -> AppResult<Self> {
        fs::create_dir_all(dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create audit log directory {dir}: {e}"),
                e,
            )
        })?;

        let path = Path::new(dir).join(format!("job_{job_id}_{}.log", Utc::now().timestamp()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open audit log {}: {e}", path.display()),
                    e,
                )
            })?;

        Ok(Self {
            job_id,
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry.
    pub async fn record(
        &mut self,
        position: i64,
        msisdn: &str,
        action: AuditAction,
        tid: Option<&str>,
        error: Option<String>,
    ) -> AppResult<()> {
        let entry = AuditEntry {
            time: Utc::now(),
            job_id: self.job_id,
            position,
            msisdn: msisdn.to_string(),
            action,
            tid: tid.map(str::to_string),
            error,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    /// Flush buffered entries to disk.
    pub async fn flush(&mut self) -> AppResult<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Read back every entry of an audit log.
pub async fn read_entries(path: &Path) -> AppResult<Vec<AuditEntry>> {
    let body = fs::read_to_string(path).await?;
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(AppError::from))
        .collect()
}
