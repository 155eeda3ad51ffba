//! Job scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the job scheduler, runner, reaper and planned poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Whether due `ready` jobs are started automatically.
    #[serde(default)]
    pub planned_enabled: bool,
    /// Planned poller period in minutes.
    #[serde(default = "default_planned_period")]
    pub planned_period_minutes: u64,
    /// How far in the past `run_at` must be before a job is auto-started.
    #[serde(default = "default_planned_grace")]
    pub planned_grace_seconds: i64,
    /// Reaper sweep interval in milliseconds.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_ms: u64,
    /// Directory injection file names are resolved against.
    #[serde(default = "default_injections_path")]
    pub injections_path: String,
    /// Directory per-job audit logs are written to.
    #[serde(default = "default_log_path")]
    pub log_path: String,
    /// Required leading digits of an injected MSISDN.
    #[serde(default = "default_check_prefix")]
    pub check_prefix: String,
    #[serde(default = "default_min_msisdn_length")]
    pub min_msisdn_length: usize,
    #[serde(default = "default_max_msisdn_length")]
    pub max_msisdn_length: usize,
    /// Completion callback URL; empty disables the callback.
    #[serde(default)]
    pub callback_url: String,
    /// Delay between publish attempts in milliseconds.
    #[serde(default = "default_publish_retry_delay")]
    pub publish_retry_delay_ms: u64,
    /// Maximum publish attempts per record (0 = retry until cancelled).
    #[serde(default)]
    pub publish_max_attempts: u32,
    /// Persist the cursor every N handled records (0 = only on stop/exit).
    #[serde(default)]
    pub checkpoint_every: u64,
    /// Operator code stamped on injection charge records.
    #[serde(default = "default_operator_code")]
    pub operator_code: i64,
    /// Country code stamped on injection charge records.
    #[serde(default = "default_country_code")]
    pub country_code: i64,
    /// How long shutdown waits for runners to exit, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            planned_enabled: false,
            planned_period_minutes: default_planned_period(),
            planned_grace_seconds: default_planned_grace(),
            reaper_interval_ms: default_reaper_interval(),
            injections_path: default_injections_path(),
            log_path: default_log_path(),
            check_prefix: default_check_prefix(),
            min_msisdn_length: default_min_msisdn_length(),
            max_msisdn_length: default_max_msisdn_length(),
            callback_url: String::new(),
            publish_retry_delay_ms: default_publish_retry_delay(),
            publish_max_attempts: 0,
            checkpoint_every: 0,
            operator_code: default_operator_code(),
            country_code: default_country_code(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl JobsConfig {
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms.max(1))
    }

    pub fn planned_period(&self) -> Duration {
        Duration::from_secs(self.planned_period_minutes.max(1) * 60)
    }

    pub fn publish_retry_delay(&self) -> Duration {
        Duration::from_millis(self.publish_retry_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Bounded attempt count, `None` when publishing retries forever.
    pub fn max_publish_attempts(&self) -> Option<u32> {
        (self.publish_max_attempts > 0).then_some(self.publish_max_attempts)
    }
}

fn default_planned_period() -> u64 {
    1
}

fn default_planned_grace() -> i64 {
    10
}

fn default_reaper_interval() -> u64 {
    1000
}

fn default_injections_path() -> String {
    "./data/injections".to_string()
}

fn default_log_path() -> String {
    "./data/logs/jobs".to_string()
}

fn default_check_prefix() -> String {
    "92".to_string()
}

fn default_min_msisdn_length() -> usize {
    5
}

fn default_max_msisdn_length() -> usize {
    20
}

fn default_publish_retry_delay() -> u64 {
    1000
}

fn default_operator_code() -> i64 {
    41001
}

fn default_country_code() -> i64 {
    92
}

fn default_shutdown_timeout() -> u64 {
    10
}
