//! Response DTOs.

use serde::{Deserialize, Serialize};

/// Empty success body, serialized as `{}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {}

/// Error body, `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub app: String,
    pub version: String,
    pub database: String,
    pub queue: String,
    pub running_jobs: usize,
    pub exiting: bool,
}
