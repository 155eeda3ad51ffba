//! Shared dependencies of the scheduler and its runners.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use campaign_core::config::jobs::JobsConfig;
use campaign_database::store::{ChargeLedger, ExpiredRetrySource, JobStore};
use campaign_queue::ChargePublisher;

use crate::catalog::ServiceCatalog;
use crate::notifier::CompletionNotifier;

/// Reachability of the backends a run depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendHealth {
    pub database: bool,
    pub queue: bool,
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        self.database && self.queue
    }
}

/// Everything a job run needs from the outside world.
#[derive(Debug)]
pub struct JobContext {
    pub store: Arc<dyn JobStore>,
    pub ledger: Arc<dyn ChargeLedger>,
    pub retries: Arc<dyn ExpiredRetrySource>,
    pub publisher: Arc<dyn ChargePublisher>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub notifier: CompletionNotifier,
    pub config: JobsConfig,
    exiting: AtomicBool,
}

impl JobContext {
    pub fn new(
        store: Arc<dyn JobStore>,
        ledger: Arc<dyn ChargeLedger>,
        retries: Arc<dyn ExpiredRetrySource>,
        publisher: Arc<dyn ChargePublisher>,
        catalog: Arc<dyn ServiceCatalog>,
        notifier: CompletionNotifier,
        config: JobsConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            retries,
            publisher,
            catalog,
            notifier,
            config,
            exiting: AtomicBool::new(false),
        }
    }

    /// Tell every runner to wind down.
    pub fn begin_exit(&self) {
        self.exiting.store(true, Ordering::SeqCst);
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    /// Ping the job store and the charge queue. Errors count as down.
    pub async fn backend_health(&self) -> BackendHealth {
        let database = self.store.health_check().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Job store health check failed");
            false
        });
        let queue = self.publisher.health_check().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Charge queue health check failed");
            false
        });
        BackendHealth { database, queue }
    }
}
