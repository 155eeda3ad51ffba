//! Scheduler facade: start, stop, status and shutdown of campaign jobs.

use std::sync::Arc;

use chrono::Utc;
use tokio::time;
use tokio_util::task::TaskTracker;

use campaign_core::error::AppError;
use campaign_core::result::AppResult;
use campaign_entity::job::{JobParams, JobStatus};

use crate::audit::AuditLog;
use crate::context::JobContext;
use crate::registry::{JobControl, JobRegistry, RunningJob, RunningJobSnapshot};
use crate::runner::{InjectionCharge, JobRunner, RunPlan};
use crate::source::SourceReader;

/// Owns the registry of running jobs and the runner tasks.
#[derive(Debug)]
pub struct JobScheduler {
    ctx: Arc<JobContext>,
    registry: JobRegistry,
    tracker: TaskTracker,
}

impl JobScheduler {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self {
            ctx,
            registry: JobRegistry::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn context(&self) -> &Arc<JobContext> {
        &self.ctx
    }

    /// Start a `ready` job and spawn its runner.
    pub async fn start(&self, id: i64) -> AppResult<()> {
        if self.ctx.is_exiting() {
            return Err(AppError::conflict("Scheduler is shutting down"));
        }

        let job = self.ctx.store.get(id).await?;
        if self.registry.contains(id) {
            return Err(AppError::conflict(format!("Job {id} is already running")));
        }
        if job.status != JobStatus::Ready {
            return Err(AppError::conflict(format!("Job status: {}", job.status)));
        }

        let params = match job.parse_params() {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(job_id = id, error = %e, "Invalid job params");
                if self
                    .ctx
                    .store
                    .transition_status(id, JobStatus::Ready, JobStatus::Error)
                    .await?
                {
                    self.ctx.notifier.notify(id, JobStatus::Error).await;
                }
                return Err(e);
            }
        };

        let plan = match &params {
            JobParams::Injection(p) => {
                let service = self.ctx.catalog.lookup(&p.service_code).await?;
                RunPlan::injection(
                    p.clone(),
                    InjectionCharge {
                        service_code: p.service_code.clone(),
                        campaign_id: p.campaign_id.clone().unwrap_or(service.campaign_id),
                        price: service.price_cents,
                    },
                )
            }
            JobParams::Expired(p) => RunPlan::expired(p.clone()),
        };

        if !self
            .ctx
            .store
            .transition_status(id, JobStatus::Ready, JobStatus::InProgress)
            .await?
        {
            return Err(AppError::conflict(format!("Job {id} is no longer ready")));
        }

        let (audit, source) = match self.open_run(id, &job.file_name, job.skip, &plan).await {
            Ok(opened) => opened,
            Err(e) => {
                tracing::error!(job_id = id, error = %e, "Failed to open job run");
                self.fail_started(id).await;
                return Err(e);
            }
        };

        let control = Arc::new(JobControl::new(job.skip));
        let skip = job.skip;
        let kind = params.kind();
        let running = RunningJob {
            job,
            params,
            control: Arc::clone(&control),
            started_at: Utc::now(),
        };
        if !self.registry.try_insert(running) {
            self.fail_started(id).await;
            return Err(AppError::conflict(format!("Job {id} is already running")));
        }

        let runner = JobRunner::new(Arc::clone(&self.ctx), id, plan, control, source, audit);
        self.tracker.spawn(runner.run());

        tracing::info!(job_id = id, kind = %kind, ?skip, "Job started");
        Ok(())
    }

    async fn open_run(
        &self,
        id: i64,
        file_name: &str,
        skip: Option<i64>,
        plan: &RunPlan,
    ) -> AppResult<(AuditLog, SourceReader)> {
        let audit = AuditLog::create(&self.ctx.config.log_path, id).await?;
        self.ctx
            .store
            .set_log_path(id, &audit.path().to_string_lossy())
            .await?;

        let source = match &plan.params {
            JobParams::Injection(_) => {
                SourceReader::open_file(&self.ctx.config.injections_path, file_name).await?
            }
            JobParams::Expired(params) => {
                SourceReader::expired(Arc::clone(&self.ctx.retries), params.clone(), skip)
            }
        };
        Ok((audit, source))
    }

    async fn fail_started(&self, id: i64) {
        match self.ctx.store.set_status(id, JobStatus::Error).await {
            Ok(()) => self.ctx.notifier.notify(id, JobStatus::Error).await,
            Err(e) => tracing::error!(job_id = id, error = %e, "Failed to mark job as error"),
        }
    }

    /// Stop a running job and persist `status` for it.
    pub async fn stop(&self, id: i64, status: JobStatus) -> AppResult<()> {
        if !status.is_terminal() {
            return Err(AppError::validation(format!(
                "Cannot stop a job with status: {status}"
            )));
        }
        let running = self
            .registry
            .claim(id)
            .ok_or_else(|| AppError::not_found(format!("Not found: {id}")))?;
        running.control.request_stop();

        tracing::info!(job_id = id, status = %status, "Stopping job");
        self.finalize(&running, status).await
    }

    /// Persist the terminal status and cursor of a claimed job, then notify.
    async fn finalize(&self, running: &RunningJob, status: JobStatus) -> AppResult<()> {
        let id = running.job.id;
        self.ctx.store.set_status(id, status).await?;
        if let Some(cursor) = running.control.cursor() {
            self.ctx.store.set_skip(id, cursor).await?;
        }
        tracing::info!(
            job_id = id,
            status = %status,
            skip = ?running.control.cursor(),
            processed = running.control.processed(),
            "Job finalized"
        );
        self.ctx.notifier.notify(id, status).await;
        Ok(())
    }

    /// Finalize every job whose runner has finished. Returns how many were
    /// finalized.
    pub async fn reap(&self) -> usize {
        let finished = self.registry.claim_finished();
        let count = finished.len();
        for running in finished {
            let status = running.control.final_status();
            if let Err(e) = self.finalize(&running, status).await {
                tracing::error!(job_id = running.job.id, error = %e, "Failed to finalize job");
            }
        }
        count
    }

    /// Snapshots of every running job.
    pub fn status(&self) -> Vec<RunningJobSnapshot> {
        self.registry.snapshot()
    }

    pub fn running_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_exiting(&self) -> bool {
        self.ctx.is_exiting()
    }

    /// Ask every runner to stop, wait for them within the configured
    /// timeout and finalize everything left in the registry.
    pub async fn shutdown(&self) {
        tracing::info!(running = self.registry.len(), "Shutting down job scheduler");
        self.ctx.begin_exit();
        self.tracker.close();

        let timeout = self.ctx.config.shutdown_timeout();
        if time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Job runners did not exit in time"
            );
        }

        self.reap().await;

        for running in self.registry.claim_all() {
            running.control.request_stop();
            if let Err(e) = self.finalize(&running, JobStatus::Canceled).await {
                tracing::error!(job_id = running.job.id, error = %e, "Failed to finalize job");
            }
        }
        tracing::info!("Job scheduler shut down");
    }
}
