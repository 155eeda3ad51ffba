//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod catalog;
pub mod database;
pub mod jobs;
pub mod logging;
pub mod queue;

use serde::{Deserialize, Serialize};

use self::app::ServerConfig;
use self::catalog::CatalogConfig;
use self::database::DatabaseConfig;
use self::jobs::JobsConfig;
use self::logging::LoggingConfig;
use self::queue::QueueConfig;

use crate::error::AppError;

/// Prefix of environment variable overrides (`CAMPAIGN__JOBS__LOG_PATH`).
pub const ENV_PREFIX: &str = "CAMPAIGN";

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Instance name, used in logs and the health response.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Charge queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Service catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `base` (e.g. `config/default`) with the sibling
    /// `<env>` overlay and environment variables prefixed with `CAMPAIGN__`.
    pub fn load(base: &str, env: &str) -> Result<Self, AppError> {
        let overlay = match base.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{env}"),
            None => env.to_string(),
        };

        let config = config::Config::builder()
            .add_source(config::File::with_name(base).required(false))
            .add_source(config::File::with_name(&overlay).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let cfg: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.app_name.is_empty() {
            return Err(AppError::configuration("app_name must not be empty"));
        }
        if self.app_name.contains('-') {
            return Err(AppError::configuration(format!(
                "app_name must not contain '-': {}",
                self.app_name
            )));
        }
        if self.jobs.min_msisdn_length > self.jobs.max_msisdn_length {
            return Err(AppError::configuration(format!(
                "jobs.min_msisdn_length ({}) exceeds jobs.max_msisdn_length ({})",
                self.jobs.min_msisdn_length, self.jobs.max_msisdn_length
            )));
        }
        Ok(())
    }
}

fn default_app_name() -> String {
    "jobs".to_string()
}
