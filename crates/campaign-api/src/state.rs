//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use campaign_worker::JobScheduler;

/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Scheduler owning the running jobs.
    pub scheduler: Arc<JobScheduler>,
    /// Configured application name, reported by `/health`.
    pub app_name: Arc<str>,
}

impl AppState {
    pub fn new(scheduler: Arc<JobScheduler>, app_name: &str) -> Self {
        Self {
            scheduler,
            app_name: Arc::from(app_name),
        }
    }
}
