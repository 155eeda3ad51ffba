//! Request DTOs.

use serde::Deserialize;

use campaign_core::AppError;

/// `?id=<int>` query of the job control endpoints.
///
/// Kept as text so a missing or malformed id reaches the handler and is
/// reported in the JSON error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    pub id: Option<String>,
}

impl IdQuery {
    /// The job id, validated.
    pub fn job_id(&self) -> Result<i64, AppError> {
        let raw = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| AppError::validation("id required"))?;
        raw.parse::<i64>()
            .map_err(|_| AppError::validation(format!("Invalid id: '{raw}'")))
    }
}
