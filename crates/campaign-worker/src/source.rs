//! Candidate sources for the two job kinds.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;
use campaign_database::store::ExpiredRetrySource;
use campaign_entity::charge::ExpiredRetry;
use campaign_entity::job::ExpiredParams;

/// One unit of input together with its cursor position.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// 0-based line index for injection files, retry id for expired jobs.
    pub position: i64,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw line of an injection file.
    Line(String),
    /// Row of the expired retry view.
    Retry(ExpiredRetry),
}

/// Line-by-line reader over an injection file.
///
/// Lines are split on raw bytes and decoded lossily, so a corrupt line
/// reaches admission as an invalid number instead of failing the read.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    reader: BufReader<File>,
    buf: Vec<u8>,
    next_index: i64,
}

impl FileSource {
    /// Open `<dir>/<file_name>`.
    pub async fn open(dir: &str, file_name: &str) -> AppResult<Self> {
        if file_name.trim().is_empty() {
            return Err(AppError::validation("File name is empty"));
        }
        let path = Path::new(dir).join(file_name);
        let file = File::open(&path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open {}: {e}", path.display()),
                e,
            )
        })?;
        tracing::info!(path = %path.display(), "Opened injection file");
        Ok(Self {
            path,
            reader: BufReader::new(file),
            buf: Vec::new(),
            next_index: 0,
        })
    }

    async fn next(&mut self) -> AppResult<Option<Candidate>> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read {}: {e}", self.path.display()),
                    e,
                )
            })?;
        if read == 0 {
            return Ok(None);
        }

        let mut line = self.buf.as_slice();
        if let Some(rest) = line.strip_suffix(b"\n") {
            line = rest.strip_suffix(b"\r").unwrap_or(rest);
        }
        let position = self.next_index;
        self.next_index += 1;
        Ok(Some(Candidate {
            position,
            payload: Payload::Line(String::from_utf8_lossy(line).into_owned()),
        }))
    }
}

/// Expired retries after the resume cursor, queried once on first use.
#[derive(Debug)]
pub enum SnapshotSource {
    Pending {
        source: Arc<dyn ExpiredRetrySource>,
        params: ExpiredParams,
        after: Option<i64>,
    },
    Loaded(VecDeque<ExpiredRetry>),
}

impl SnapshotSource {
    async fn next(&mut self) -> AppResult<Option<Candidate>> {
        if let Self::Pending {
            source,
            params,
            after,
        } = self
        {
            let rows = source.load_expired(params, *after).await?;
            tracing::info!(count = rows.len(), ?after, "Loaded expired retry snapshot");
            *self = Self::Loaded(rows.into());
        }
        match self {
            Self::Loaded(rows) => Ok(rows.pop_front().map(|row| Candidate {
                position: row.retry_id,
                payload: Payload::Retry(row),
            })),
            Self::Pending { .. } => Ok(None),
        }
    }
}

/// Source of candidates for one job run.
#[derive(Debug)]
pub enum SourceReader {
    File(FileSource),
    Snapshot(SnapshotSource),
}

impl SourceReader {
    pub async fn open_file(dir: &str, file_name: &str) -> AppResult<Self> {
        FileSource::open(dir, file_name).await.map(Self::File)
    }

    pub fn expired(
        source: Arc<dyn ExpiredRetrySource>,
        params: ExpiredParams,
        after: Option<i64>,
    ) -> Self {
        Self::Snapshot(SnapshotSource::Pending {
            source,
            params,
            after,
        })
    }

    /// Next candidate, `None` at the end of the source.
    pub async fn next(&mut self) -> AppResult<Option<Candidate>> {
        match self {
            Self::File(file) => file.next().await,
            Self::Snapshot(snapshot) => snapshot.next().await,
        }
    }
}
