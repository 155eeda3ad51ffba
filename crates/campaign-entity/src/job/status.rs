//! Job status and kind enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a persisted enum string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what}: '{value}'")]
pub struct ParseEnumError {
    what: &'static str,
    value: String,
}

/// Lifecycle status of a campaign job.
///
/// Persisted as text with exactly the strings returned by [`JobStatus::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Created, waiting to be started.
    #[serde(rename = "ready")]
    Ready,
    /// Owned by a running job runner.
    #[serde(rename = "in progress")]
    InProgress,
    /// Source exhausted or record limit reached.
    #[serde(rename = "done")]
    Done,
    /// Failed to start or failed while running.
    #[serde(rename = "error")]
    Error,
    /// Stopped by request or by process exit.
    #[serde(rename = "canceled")]
    Canceled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Canceled)
    }

    /// Return the persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::InProgress => "in progress",
            Self::Done => "done",
            Self::Error => "error",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Self::Ready),
            "in progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            "canceled" => Ok(Self::Canceled),
            other => Err(ParseEnumError {
                what: "job status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, ParseEnumError> {
        value.parse()
    }
}

/// Compact code used by the shared control state of a running job.
impl From<JobStatus> for u8 {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Ready => 0,
            JobStatus::InProgress => 1,
            JobStatus::Done => 2,
            JobStatus::Error => 3,
            JobStatus::Canceled => 4,
        }
    }
}

impl TryFrom<u8> for JobStatus {
    type Error = ParseEnumError;

    fn try_from(code: u8) -> Result<Self, ParseEnumError> {
        match code {
            0 => Ok(Self::Ready),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Done),
            3 => Ok(Self::Error),
            4 => Ok(Self::Canceled),
            _ => Err(ParseEnumError {
                what: "job status code",
                value: code.to_string(),
            }),
        }
    }
}

/// Kind of campaign a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Walk a file of subscriber numbers.
    Injection,
    /// Re-charge rows of the expired retry view.
    Expired,
}

impl JobKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Injection => "injection",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "injection" => Ok(Self::Injection),
            "expired" => Ok(Self::Expired),
            other => Err(ParseEnumError {
                what: "job type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for JobKind {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, ParseEnumError> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_are_stable() {
        for status in [
            JobStatus::Ready,
            JobStatus::InProgress,
            JobStatus::Done,
            JobStatus::Error,
            JobStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
            assert_eq!(JobStatus::try_from(u8::from(status)).unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"in progress\""
        );
    }

    #[test]
    fn test_unknown_values_are_rejected() {
        let err = "running".parse::<JobStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown job status: 'running'");
        assert!("mo".parse::<JobKind>().is_err());
        assert!(JobStatus::try_from(9u8).is_err());
    }

    #[test]
    fn test_try_from_database_text() {
        assert_eq!(
            JobStatus::try_from("error".to_string()).unwrap(),
            JobStatus::Error
        );
        assert_eq!(
            JobKind::try_from("expired".to_string()).unwrap(),
            JobKind::Expired
        );
        let err = JobStatus::try_from("paused".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "unknown job status: 'paused'");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Ready.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }
}
