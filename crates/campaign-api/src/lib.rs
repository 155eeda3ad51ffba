//! # campaign-api
//!
//! HTTP control surface for Campaign Jobs built on Axum.
//!
//! Exposes `/jobs/start`, `/jobs/stop`, `/jobs/status` and `/health`, maps
//! [`campaign_core::AppError`] to JSON error bodies and logs every request.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
