//! Redis list charge publisher.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;
use campaign_entity::charge::ChargeEvent;

use super::client::RedisClient;
use crate::publisher::ChargePublisher;

/// Pushes charge events onto `<key_prefix><queue>` with `RPUSH`.
#[derive(Debug, Clone)]
pub struct RedisPublisher {
    client: RedisClient,
    queue_key: String,
}

impl RedisPublisher {
    /// Create a publisher for the given queue name.
    pub fn new(client: RedisClient, queue: &str) -> Self {
        let queue_key = client.prefixed_key(queue);
        Self { client, queue_key }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Queue, format!("Redis error: {e}"), e)
    }
}

#[async_trait]
impl ChargePublisher for RedisPublisher {
    async fn publish(&self, event: &ChargeEvent) -> AppResult<()> {
        let body = serde_json::to_string(event)?;
        let mut conn = self.client.conn_mut();
        let len: i64 = conn
            .rpush(&self.queue_key, body)
            .await
            .map_err(Self::map_err)?;
        debug!(
            queue = %self.queue_key,
            tid = %event.event_data.tid,
            queue_len = len,
            "Charge published"
        );
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}
