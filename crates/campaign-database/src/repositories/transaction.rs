//! Charge transaction ledger lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use campaign_core::config::database::DatabaseConfig;
use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;

use crate::store::{ChargeLedger, EVER_PAID_RESULTS, RECENT_PAID_RESULTS};

/// Read-only repository over the `transactions` table.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: PgPool,
    table: String,
}

impl TransactionRepository {
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            table: config.table("transactions"),
        }
    }
}

/// Render result names as a SQL `IN` list.
pub(crate) fn result_list(results: &[&str]) -> String {
    results
        .iter()
        .map(|r| format!("'{r}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl ChargeLedger for TransactionRepository {
    async fn has_paid_since(&self, msisdn: &str, since: DateTime<Utc>) -> AppResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE msisdn = $1 AND result IN ({}) AND sent_at > $2)",
            self.table,
            result_list(RECENT_PAID_RESULTS)
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(msisdn)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to check recent charges", e)
            })
    }

    async fn has_ever_paid(&self, msisdn: &str) -> AppResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE msisdn = $1 AND result IN ({}))",
            self.table,
            result_list(EVER_PAID_RESULTS)
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(msisdn)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to check charge history", e)
            })
    }
}
