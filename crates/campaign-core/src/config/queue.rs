//! Charge queue transport configuration.

use serde::{Deserialize, Serialize};

/// Redis-backed charge queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis connection URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Prefix prepended to every queue key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Name of the queue charge events are pushed to.
    #[serde(default = "default_charge_queue")]
    pub charge_queue: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key_prefix: default_key_prefix(),
            charge_queue: default_charge_queue(),
        }
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "campaign:".to_string()
}

fn default_charge_queue() -> String {
    "mobilink_requests".to_string()
}
