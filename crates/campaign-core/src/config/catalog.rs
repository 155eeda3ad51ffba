//! Service catalog configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Where injection jobs resolve price and default campaign from.
///
/// When `url` is set the HTTP catalog is used; otherwise lookups go to the
/// static `services` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog service.
    #[serde(default)]
    pub url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Static service table keyed by service code.
    #[serde(default)]
    pub services: HashMap<String, ServiceEntry>,
}

/// A single service as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Charge amount in cents.
    pub price_cents: i64,
    /// Default campaign for the service.
    #[serde(default)]
    pub campaign_id: String,
}

fn default_timeout() -> u64 {
    5
}
