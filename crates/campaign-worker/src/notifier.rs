//! Best-effort completion callback.

use std::time::Duration;

use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;
use campaign_entity::job::JobStatus;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls `GET <url>?id=<id>&status=<status>` when a job reaches a
/// terminal status. Failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl CompletionNotifier {
    /// Create a notifier; an empty `url` disables the callback.
    pub fn new(url: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Failed to build callback client", e)
            })?;
        let url = Some(url.trim()).filter(|u| !u.is_empty()).map(str::to_string);
        Ok(Self { client, url })
    }

    /// A notifier that never calls out.
    pub fn disabled() -> AppResult<Self> {
        Self::new("")
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Fire the callback for `id`.
    pub async fn notify(&self, id: i64, status: JobStatus) {
        let Some(base) = &self.url else {
            return;
        };

        let url = match reqwest::Url::parse_with_params(
            base,
            &[("id", id.to_string()), ("status", status.as_str().to_string())],
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %base, error = %e, "Invalid callback URL");
                return;
            }
        };

        match self.client.get(url.clone()).send().await {
            Ok(response) => tracing::info!(
                url = %url,
                code = %response.status(),
                "Completion callback called"
            ),
            Err(e) => tracing::warn!(url = %url, error = %e, "Completion callback failed"),
        }
    }
}
