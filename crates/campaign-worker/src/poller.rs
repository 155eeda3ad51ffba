//! Planned poller: starts `ready` jobs whose `run_at` has passed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time;

use campaign_entity::job::JobStatus;

use crate::scheduler::JobScheduler;

#[derive(Debug, Clone)]
pub struct PlannedPoller {
    scheduler: Arc<JobScheduler>,
    period: Duration,
    grace_seconds: i64,
}

impl PlannedPoller {
    pub fn new(scheduler: Arc<JobScheduler>, period: Duration, grace_seconds: i64) -> Self {
        Self {
            scheduler,
            period,
            grace_seconds,
        }
    }

    /// One sweep over `ready` jobs. Returns how many were started.
    pub async fn poll_once(&self) -> usize {
        let jobs = match self
            .scheduler
            .context()
            .store
            .list_by_status(JobStatus::Ready)
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list ready jobs");
                return 0;
            }
        };

        let now = Utc::now();
        let mut started = 0;
        for job in jobs.iter().filter(|job| job.is_due(now, self.grace_seconds)) {
            match self.scheduler.start(job.id).await {
                Ok(()) => started += 1,
                Err(e) => tracing::warn!(job_id = job.id, error = %e, "Planned start failed"),
            }
        }
        if started > 0 {
            tracing::info!(started, "Started planned jobs");
        }
        started
    }

    /// Run until the cancel signal is received. The first sweep happens
    /// one period after start.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            period_secs = self.period.as_secs(),
            grace_seconds = self.grace_seconds,
            "Planned poller started"
        );
        let mut ticker = time::interval_at(time::Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("Planned poller received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.scheduler.is_exiting() {
                        continue;
                    }
                    self.poll_once().await;
                }
            }
        }
    }
}
