//! Expired retry view repository.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

use campaign_core::config::database::DatabaseConfig;
use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;
use campaign_entity::charge::ExpiredRetry;
use campaign_entity::job::ExpiredParams;

use super::transaction::result_list;
use crate::store::{EVER_PAID_RESULTS, ExpiredRetrySource, RECENT_PAID_RESULTS};

/// Reads lapsed retries from `retries_expired`.
#[derive(Debug, Clone)]
pub struct ExpiredRetryRepository {
    pool: PgPool,
    retries_table: String,
    transactions_table: String,
}

impl ExpiredRetryRepository {
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            retries_table: config.table("retries_expired"),
            transactions_table: config.table("transactions"),
        }
    }
}

/// Build the expired retry query.
///
/// The inner `DISTINCT ON` keeps one row per subscriber, `order` choosing
/// which; the outer query orders by retry id so positions only grow. A
/// resumed job passes its cursor as `after` so `LIMIT` counts unseen rows.
pub(crate) fn build_expired_query(
    retries_table: &str,
    transactions_table: &str,
    params: &ExpiredParams,
    after: Option<i64>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT * FROM (SELECT DISTINCT ON (msisdn) \
         id AS retry_id, msisdn, tid, created_at, last_pay_attempt_at, attempts_count, \
         retry_days, delay_hours, price, operator_code, country_code, \
         id_service AS service_code, id_subscription AS subscription_id, \
         id_campaign AS campaign_id FROM ",
    );
    qb.push(retries_table);
    qb.push(" WHERE TRUE");

    if let Some(from) = params.date_from {
        qb.push(" AND created_at > ").push_bind(from);
    }
    if let Some(to) = params.date_to {
        qb.push(" AND created_at < ").push_bind(to);
    }
    if let Some(code) = &params.service_code {
        qb.push(" AND id_service = ").push_bind(code.clone());
    }
    if let Some(campaign) = &params.campaign_id {
        qb.push(" AND id_campaign = ").push_bind(campaign.clone());
    }
    if params.never {
        qb.push(format!(
            " AND msisdn NOT IN (SELECT DISTINCT msisdn FROM {transactions_table} WHERE result IN ({}))",
            result_list(EVER_PAID_RESULTS)
        ));
    }
    if let Some(since) = params.last_charge_at {
        qb.push(format!(
            " AND msisdn NOT IN (SELECT DISTINCT msisdn FROM {transactions_table} WHERE result IN ({}) AND sent_at > ",
            result_list(RECENT_PAID_RESULTS)
        ))
        .push_bind(since)
        .push(")");
    }

    qb.push(" ORDER BY msisdn, id ");
    qb.push(params.order.as_sql());
    qb.push(") AS expired");
    if let Some(after) = after {
        qb.push(" WHERE retry_id > ").push_bind(after);
    }
    qb.push(" ORDER BY retry_id ASC");

    if let Some(count) = params.count {
        qb.push(" LIMIT ").push_bind(count as i64);
    }
    qb
}

#[async_trait]
impl ExpiredRetrySource for ExpiredRetryRepository {
    async fn load_expired(
        &self,
        params: &ExpiredParams,
        after: Option<i64>,
    ) -> AppResult<Vec<ExpiredRetry>> {
        let begin = Instant::now();
        let mut qb =
            build_expired_query(&self.retries_table, &self.transactions_table, params, after);
        let sql = qb.sql().to_string();

        let rows = qb
            .build_query_as::<ExpiredRetry>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    query = %sql,
                    took_ms = begin.elapsed().as_millis() as u64,
                    "Load expired retries failed"
                );
                AppError::with_source(ErrorKind::Database, "Failed to load expired retries", e)
            })?;

        debug!(
            count = rows.len(),
            limit = ?params.count,
            ?after,
            took_ms = begin.elapsed().as_millis() as u64,
            "Loaded expired retries"
        );
        Ok(rows)
    }
}
