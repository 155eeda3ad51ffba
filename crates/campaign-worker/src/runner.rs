//! Job runner: walks one job's source and publishes charges.

use std::sync::Arc;

use campaign_entity::charge::{ChargeEvent, ChargeRecord, ExpiredRetry};
use campaign_entity::job::{ExpiredParams, InjectionParams, JobParams, JobStatus};

use crate::admission::{self, AdmissionRules};
use crate::audit::{AuditAction, AuditLog};
use crate::context::JobContext;
use crate::dedup::DedupSet;
use crate::registry::JobControl;
use crate::retry::{RetryOutcome, RetryPolicy, retry_until};
use crate::source::{Payload, SourceReader};

/// Charge settings resolved for an injection job before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionCharge {
    pub service_code: String,
    pub campaign_id: String,
    pub price: i64,
}

/// What a run does with each candidate.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub params: JobParams,
    /// Resolved for injection jobs only.
    pub charge: Option<InjectionCharge>,
}

impl RunPlan {
    pub fn injection(params: InjectionParams, charge: InjectionCharge) -> Self {
        Self {
            params: JobParams::Injection(params),
            charge: Some(charge),
        }
    }

    pub fn expired(params: ExpiredParams) -> Self {
        Self {
            params: JobParams::Expired(params),
            charge: None,
        }
    }
}

enum Step {
    Next,
    Finish(JobStatus),
}

/// Owns everything one run mutates.
#[derive(Debug)]
struct RunState {
    ctx: Arc<JobContext>,
    job_id: i64,
    control: Arc<JobControl>,
    source: SourceReader,
    audit: AuditLog,
    dedup: DedupSet,
    rules: AdmissionRules,
    retry: RetryPolicy,
    resume_after: Option<i64>,
    since_checkpoint: u64,
}

/// One started job. Consumed by [`JobRunner::run`].
#[derive(Debug)]
pub struct JobRunner {
    plan: RunPlan,
    state: RunState,
}

impl JobRunner {
    pub fn new(
        ctx: Arc<JobContext>,
        job_id: i64,
        plan: RunPlan,
        control: Arc<JobControl>,
        source: SourceReader,
        audit: AuditLog,
    ) -> Self {
        let retry = match ctx.config.max_publish_attempts() {
            Some(max) => RetryPolicy::bounded(ctx.config.publish_retry_delay(), max),
            None => RetryPolicy::unbounded(ctx.config.publish_retry_delay()),
        };
        let rules = AdmissionRules::from_config(&ctx.config);
        let resume_after = control.cursor();
        Self {
            plan,
            state: RunState {
                ctx,
                job_id,
                control,
                source,
                audit,
                dedup: DedupSet::new(),
                rules,
                retry,
                resume_after,
                since_checkpoint: 0,
            },
        }
    }

    /// Drive the job to a terminal status, persist the cursor and flag the
    /// run as finished. Finalization is left to whoever claims the job.
    pub async fn run(mut self) -> JobStatus {
        let job_id = self.state.job_id;
        tracing::info!(
            job_id,
            resume_after = ?self.state.resume_after,
            kind = %self.plan.params.kind(),
            dry_run = self.plan.params.dry_run(),
            "Job runner started"
        );

        let status = self.drive().await;

        if let Err(e) = self.state.audit.flush().await {
            tracing::warn!(job_id, error = %e, "Failed to flush audit log");
        }
        self.state.persist_cursor().await;
        self.state.control.finish(status);

        tracing::info!(
            job_id,
            status = %status,
            processed = self.state.control.processed(),
            unique = self.state.dedup.seen_count(),
            skip = ?self.state.control.cursor(),
            "Job runner finished"
        );
        status
    }

    async fn drive(&mut self) -> JobStatus {
        let limit = self.plan.params.count();
        let dry_run = self.plan.params.dry_run();
        let state = &mut self.state;

        loop {
            if state.cancelled() {
                return JobStatus::Canceled;
            }
            if limit.is_some_and(|limit| state.control.processed() >= limit) {
                tracing::info!(job_id = state.job_id, ?limit, "Record limit reached");
                return JobStatus::Done;
            }

            let candidate = match state.source.next().await {
                Ok(Some(candidate)) => candidate,
                Ok(None) => return JobStatus::Done,
                Err(e) => {
                    tracing::error!(job_id = state.job_id, error = %e, "Failed to read job source");
                    return JobStatus::Error;
                }
            };

            let position = candidate.position;
            if state.resume_after.is_some_and(|skip| position <= skip) {
                state.catch_up(&candidate.payload);
                continue;
            }
            state.control.record_processed();

            let step = match (&self.plan.params, &self.plan.charge, candidate.payload) {
                (JobParams::Injection(params), Some(charge), Payload::Line(line)) => {
                    state.handle_line(params, charge, position, &line, dry_run).await
                }
                (JobParams::Expired(params), None, Payload::Retry(row)) => {
                    state.handle_retry(params, position, row, dry_run).await
                }
                _ => {
                    tracing::error!(job_id = state.job_id, "Candidate does not match job type");
                    Step::Finish(JobStatus::Error)
                }
            };

            match step {
                Step::Next => {
                    state.control.advance(position);
                    state.maybe_checkpoint().await;
                }
                Step::Finish(status) => return status,
            }
        }
    }
}

impl RunState {
    fn cancelled(&self) -> bool {
        self.control.stop_requested() || self.ctx.is_exiting()
    }

    /// Remember a subscriber handled by an earlier run so a repeat after
    /// the cursor is treated as a duplicate. Nothing is audited.
    fn catch_up(&mut self, payload: &Payload) {
        let msisdn = match payload {
            Payload::Line(line) => match self.rules.check(line) {
                Ok(msisdn) => msisdn,
                Err(_) => return,
            },
            Payload::Retry(row) => row.msisdn.clone(),
        };
        self.dedup.first_seen(&msisdn);
    }

    async fn handle_line(
        &mut self,
        params: &InjectionParams,
        charge: &InjectionCharge,
        position: i64,
        line: &str,
        dry_run: bool,
    ) -> Step {
        let msisdn = match self.rules.check(line) {
            Ok(msisdn) => msisdn,
            Err(rejection) => {
                tracing::debug!(job_id = self.job_id, position, %rejection, "Rejected line");
                self.audit(
                    position,
                    admission::normalize(line),
                    AuditAction::Invalid,
                    None,
                    Some(rejection.to_string()),
                )
                .await;
                return Step::Next;
            }
        };

        match admission::ledger_guard(
            self.ctx.ledger.as_ref(),
            &msisdn,
            params.last_charge_at,
            params.never,
        )
        .await
        {
            Ok(None) => {}
            Ok(Some(reason)) => {
                self.audit(
                    position,
                    &msisdn,
                    AuditAction::AlreadyCharged,
                    None,
                    Some(reason.to_string()),
                )
                .await;
                return Step::Next;
            }
            Err(e) => {
                tracing::warn!(job_id = self.job_id, msisdn = %msisdn, error = %e, "Ledger lookup failed");
                self.audit(position, &msisdn, AuditAction::Error, None, Some(e.to_string()))
                    .await;
                return Step::Next;
            }
        }

        if !self.dedup.first_seen(&msisdn) {
            self.audit(position, &msisdn, AuditAction::Duplicate, None, None)
                .await;
            return Step::Next;
        }

        let record = ChargeRecord::injection(
            &msisdn,
            &charge.service_code,
            &charge.campaign_id,
            charge.price,
            self.ctx.config.operator_code,
            self.ctx.config.country_code,
        );
        self.deliver(position, record, dry_run).await
    }

    async fn handle_retry(
        &mut self,
        params: &ExpiredParams,
        position: i64,
        row: ExpiredRetry,
        dry_run: bool,
    ) -> Step {
        if !self.dedup.first_seen(&row.msisdn) {
            self.audit(position, &row.msisdn, AuditAction::Duplicate, None, None)
                .await;
            return Step::Next;
        }

        let mut record = ChargeRecord::from_expired(&row);
        if let Some(service_code) = &params.service_code {
            record.service_code = service_code.clone();
        }
        if let Some(campaign_id) = &params.campaign_id {
            record.campaign_id = campaign_id.clone();
        }
        self.deliver(position, record, dry_run).await
    }

    /// Publish with retry. The cursor only moves past records that were
    /// actually handed to the queue.
    async fn deliver(&mut self, position: i64, record: ChargeRecord, dry_run: bool) -> Step {
        let msisdn = record.msisdn.clone();
        let tid = record.tid.clone();

        if dry_run {
            self.audit(position, &msisdn, AuditAction::DryRun, Some(&tid), None)
                .await;
            return Step::Next;
        }

        let event = ChargeEvent::charge(record);
        let event = &event;
        let ctx = &self.ctx;
        let control = &self.control;
        let publisher = &self.ctx.publisher;
        let outcome = retry_until(
            &self.retry,
            move || control.stop_requested() || ctx.is_exiting(),
            move |_attempt| publisher.publish(event),
        )
        .await;

        match outcome {
            RetryOutcome::Done(()) => {
                self.audit(position, &msisdn, AuditAction::Sent, Some(&tid), None)
                    .await;
                Step::Next
            }
            RetryOutcome::Cancelled => {
                tracing::info!(job_id = self.job_id, position, "Stopped while retrying publish");
                Step::Finish(JobStatus::Canceled)
            }
            RetryOutcome::Exhausted(e) => {
                tracing::error!(job_id = self.job_id, position, error = %e, "Publish attempts exhausted");
                self.audit(position, &msisdn, AuditAction::Error, Some(&tid), Some(e.to_string()))
                    .await;
                Step::Finish(JobStatus::Error)
            }
        }
    }

    async fn audit(
        &mut self,
        position: i64,
        msisdn: &str,
        action: AuditAction,
        tid: Option<&str>,
        error: Option<String>,
    ) {
        if let Err(e) = self.audit.record(position, msisdn, action, tid, error).await {
            tracing::warn!(job_id = self.job_id, position, error = %e, "Failed to write audit entry");
        }
    }

    async fn maybe_checkpoint(&mut self) {
        let every = self.ctx.config.checkpoint_every;
        if every == 0 {
            return;
        }
        self.since_checkpoint += 1;
        if self.since_checkpoint >= every {
            self.since_checkpoint = 0;
            if let Err(e) = self.audit.flush().await {
                tracing::warn!(job_id = self.job_id, error = %e, "Failed to flush audit log");
            }
            self.persist_cursor().await;
        }
    }

    async fn persist_cursor(&self) {
        let Some(cursor) = self.control.cursor() else {
            return;
        };
        if let Err(e) = self.ctx.store.set_skip(self.job_id, cursor).await {
            tracing::error!(job_id = self.job_id, cursor, error = %e, "Failed to persist cursor");
        }
    }
}
