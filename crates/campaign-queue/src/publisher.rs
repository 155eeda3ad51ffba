//! Charge publisher trait.

use async_trait::async_trait;

use campaign_core::result::AppResult;
use campaign_entity::charge::ChargeEvent;

/// At-least-once delivery of charge events to the billing queue.
///
/// A failed publish is retryable; callers decide how often to retry.
#[async_trait]
pub trait ChargePublisher: Send + Sync + std::fmt::Debug + 'static {
    /// Enqueue one charge event.
    async fn publish(&self, event: &ChargeEvent) -> AppResult<()>;

    /// Check that the queue backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
