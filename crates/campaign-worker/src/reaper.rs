//! Periodic finalization of finished jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::scheduler::JobScheduler;

/// Sweeps the registry for runners that flagged themselves finished.
#[derive(Debug, Clone)]
pub struct Reaper {
    scheduler: Arc<JobScheduler>,
    interval: Duration,
}

impl Reaper {
    pub fn new(scheduler: Arc<JobScheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Run until the cancel signal is received.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Reaper started");
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("Reaper received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let reaped = self.scheduler.reap().await;
                    if reaped > 0 {
                        tracing::debug!(reaped, "Reaped finished jobs");
                    }
                }
            }
        }
    }
}
