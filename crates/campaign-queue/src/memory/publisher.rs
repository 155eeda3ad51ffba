//! In-memory charge publisher.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use campaign_core::error::AppError;
use campaign_core::result::AppResult;
use campaign_entity::charge::ChargeEvent;

use crate::publisher::ChargePublisher;

/// Keeps every published event in order.
///
/// [`MemoryPublisher::fail_after`] makes the publisher start rejecting
/// events once a number of them went through, until [`MemoryPublisher::recover`]
/// is called.
#[derive(Debug)]
pub struct MemoryPublisher {
    events: Mutex<Vec<ChargeEvent>>,
    fail_after: AtomicU64,
    failing: AtomicBool,
    rejected: AtomicU64,
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_after: AtomicU64::new(u64::MAX),
            failing: AtomicBool::new(false),
            rejected: AtomicU64::new(0),
        }
    }
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every publish once `accepted` events have been stored.
    pub fn fail_after(&self, accepted: u64) {
        self.fail_after.store(accepted, Ordering::SeqCst);
    }

    /// Reject every publish from now on.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Accept publishes again.
    pub fn recover(&self) {
        self.fail_after.store(u64::MAX, Ordering::SeqCst);
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Copy of the published events, in publish order.
    pub async fn events(&self) -> Vec<ChargeEvent> {
        self.events.lock().await.clone()
    }

    /// Published subscriber numbers, in publish order.
    pub async fn msisdns(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .map(|e| e.event_data.msisdn.clone())
            .collect()
    }

    /// Number of publishes rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChargePublisher for MemoryPublisher {
    async fn publish(&self, event: &ChargeEvent) -> AppResult<()> {
        let mut events = self.events.lock().await;
        if self.failing.load(Ordering::SeqCst)
            || events.len() as u64 >= self.fail_after.load(Ordering::SeqCst)
        {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(AppError::queue("queue unavailable"));
        }
        events.push(event.clone());
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(!self.failing.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_entity::charge::ChargeRecord;

    fn event(msisdn: &str) -> ChargeEvent {
        ChargeEvent::charge(ChargeRecord::injection(msisdn, "290", "17", 100, 41001, 92))
    }

    #[tokio::test]
    async fn test_fail_after_and_recover() {
        let publisher = MemoryPublisher::new();
        publisher.fail_after(1);

        publisher.publish(&event("92300")).await.unwrap();
        let err = publisher.publish(&event("92301")).await.unwrap_err();
        assert_eq!(err.kind, campaign_core::error::ErrorKind::Queue);
        assert_eq!(publisher.rejected(), 1);

        publisher.recover();
        publisher.publish(&event("92301")).await.unwrap();
        assert_eq!(publisher.msisdns().await, vec!["92300", "92301"]);
    }
}
