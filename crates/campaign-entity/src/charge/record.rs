//! Charge record and the queue envelope around it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::retry::ExpiredRetry;
use crate::job::JobKind;

/// Attempt count stamped on every record; the billing side only needs it
/// to be greater than zero.
pub const ATTEMPTS_MARKER: i32 = 10;

/// The unit handed to the charge publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRecord {
    pub msisdn: String,
    /// Fresh transaction id.
    pub tid: String,
    pub campaign_id: String,
    pub service_code: String,
    /// Price in cents.
    pub price: i64,
    pub operator_code: i64,
    pub country_code: i64,
    pub attempts_count: i32,
    #[serde(rename = "type")]
    pub kind: JobKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pay_attempt_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_days: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_hours: Option<i32>,
}

impl ChargeRecord {
    /// Build an injection charge for one subscriber.
    pub fn injection(
        msisdn: &str,
        service_code: &str,
        campaign_id: &str,
        price: i64,
        operator_code: i64,
        country_code: i64,
    ) -> Self {
        Self {
            msisdn: msisdn.to_string(),
            tid: generate_tid(msisdn),
            campaign_id: campaign_id.to_string(),
            service_code: service_code.to_string(),
            price,
            operator_code,
            country_code,
            attempts_count: ATTEMPTS_MARKER,
            kind: JobKind::Injection,
            retry_id: None,
            subscription_id: None,
            created_at: None,
            last_pay_attempt_at: None,
            retry_days: None,
            delay_hours: None,
        }
    }

    /// Build a re-charge from an expired retry row. The row keeps its own
    /// price, operator and country.
    pub fn from_expired(retry: &ExpiredRetry) -> Self {
        Self {
            msisdn: retry.msisdn.clone(),
            tid: generate_tid(&retry.msisdn),
            campaign_id: retry.campaign_id.clone(),
            service_code: retry.service_code.clone(),
            price: retry.price,
            operator_code: retry.operator_code,
            country_code: retry.country_code,
            attempts_count: ATTEMPTS_MARKER,
            kind: JobKind::Expired,
            retry_id: Some(retry.retry_id),
            subscription_id: Some(retry.subscription_id),
            created_at: Some(retry.created_at),
            last_pay_attempt_at: Some(retry.last_pay_attempt_at),
            retry_days: Some(retry.retry_days),
            delay_hours: Some(retry.delay_hours),
        }
    }
}

/// Envelope pushed to the charge queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeEvent {
    pub event_name: String,
    pub event_data: ChargeRecord,
}

impl ChargeEvent {
    pub fn charge(record: ChargeRecord) -> Self {
        Self {
            event_name: "charge".to_string(),
            event_data: record,
        }
    }
}

/// Generate a transaction id: `<unix seconds>-<msisdn>-<random>`.
pub fn generate_tid(msisdn: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{msisdn}-{}", Utc::now().timestamp(), &random[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry() -> ExpiredRetry {
        let now = Utc::now();
        ExpiredRetry {
            retry_id: 42,
            msisdn: "923000000001".to_string(),
            tid: "old-tid".to_string(),
            created_at: now,
            last_pay_attempt_at: now,
            attempts_count: 3,
            retry_days: 7,
            delay_hours: 24,
            price: 1500,
            operator_code: 41001,
            country_code: 92,
            service_code: "290".to_string(),
            subscription_id: 9,
            campaign_id: "17".to_string(),
        }
    }

    #[test]
    fn test_tids_are_unique_and_carry_msisdn() {
        let a = generate_tid("923000000001");
        let b = generate_tid("923000000001");
        assert_ne!(a, b);
        assert!(a.contains("-923000000001-"));
    }

    #[test]
    fn test_expired_record_keeps_row_values() {
        let record = ChargeRecord::from_expired(&retry());
        assert_eq!(record.kind, JobKind::Expired);
        assert_eq!(record.price, 1500);
        assert_eq!(record.retry_id, Some(42));
        assert_eq!(record.attempts_count, ATTEMPTS_MARKER);
        assert_ne!(record.tid, "old-tid");
    }

    #[test]
    fn test_event_envelope_shape() {
        let record = ChargeRecord::injection("923000000001", "290", "17", 1500, 41001, 92);
        let value = serde_json::to_value(ChargeEvent::charge(record)).unwrap();
        assert_eq!(value["event_name"], "charge");
        assert_eq!(value["event_data"]["type"], "injection");
        assert_eq!(value["event_data"]["msisdn"], "923000000001");
        assert!(value["event_data"].get("retry_id").is_none());
    }
}
