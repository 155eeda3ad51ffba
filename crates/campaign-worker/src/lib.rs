//! Resumable charge campaign scheduling for Campaign Jobs.
//!
//! This crate provides:
//! - A job scheduler facade (`start`, `stop`, `status`, `shutdown`)
//! - The per-job runner that walks a source, filters and deduplicates
//!   subscribers and publishes charges with retry
//! - A reaper that finalizes finished jobs
//! - A planned poller that starts due `ready` jobs

pub mod admission;
pub mod audit;
pub mod catalog;
pub mod context;
pub mod dedup;
pub mod notifier;
pub mod poller;
pub mod reaper;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod source;

pub use context::{BackendHealth, JobContext};
pub use poller::PlannedPoller;
pub use reaper::Reaper;
pub use registry::RunningJobSnapshot;
pub use scheduler::JobScheduler;
