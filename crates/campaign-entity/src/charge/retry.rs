//! Expired retry row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A lapsed charge retry, as read from the `retries_expired` view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExpiredRetry {
    /// Row id; doubles as the cursor position of expired jobs.
    pub retry_id: i64,
    pub msisdn: String,
    /// Transaction id of the failed charge attempt.
    pub tid: String,
    pub created_at: DateTime<Utc>,
    pub last_pay_attempt_at: DateTime<Utc>,
    pub attempts_count: i32,
    pub retry_days: i32,
    pub delay_hours: i32,
    pub price: i64,
    pub operator_code: i64,
    pub country_code: i64,
    pub service_code: String,
    pub subscription_id: i64,
    pub campaign_id: String,
}
