//! Job repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use campaign_core::config::database::DatabaseConfig;
use campaign_core::error::{AppError, ErrorKind};
use campaign_core::result::AppResult;
use campaign_entity::job::{Job, JobStatus, NewJob};

use crate::store::JobStore;

const JOB_COLUMNS: &str = "id, id_user AS user_id, created_at, run_at, type, status, \
     file_name, params, skip, log_path, finished_at";

/// Repository for campaign job rows.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
    table: String,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            table: config.table("jobs"),
        }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn get(&self, id: i64) -> AppResult<Job> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM {} WHERE id = $1", self.table);
        sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))?
            .ok_or_else(|| AppError::not_found(format!("Not found: {id}")))
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM {} WHERE status = $1 ORDER BY run_at, id",
            self.table
        );
        sqlx::query_as::<_, Job>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))
    }

    async fn create(&self, job: &NewJob) -> AppResult<Job> {
        let sql = format!(
            "INSERT INTO {} (id_user, run_at, type, status, file_name, params) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {JOB_COLUMNS}",
            self.table
        );
        sqlx::query_as::<_, Job>(&sql)
            .bind(job.user_id)
            .bind(job.run_at)
            .bind(job.kind.as_str())
            .bind(JobStatus::Ready.as_str())
            .bind(&job.file_name)
            .bind(&job.params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    async fn transition_status(
        &self,
        id: i64,
        from: JobStatus,
        to: JobStatus,
    ) -> AppResult<bool> {
        let sql = format!(
            "UPDATE {} SET status = $1 WHERE id = $2 AND status = $3",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to transition job status", e)
            })?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_status(&self, id: i64, status: JobStatus) -> AppResult<()> {
        let sql = format!("UPDATE {} SET status = $1 WHERE id = $2", self.table);
        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set job status", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Not found: {id}")));
        }
        Ok(())
    }

    async fn set_skip(&self, id: i64, skip: i64) -> AppResult<bool> {
        let sql = format!(
            "UPDATE {} SET skip = $1, finished_at = NOW() \
             WHERE id = $2 AND (skip IS NULL OR skip < $1)",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(skip)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set job skip", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_log_path(&self, id: i64, path: &str) -> AppResult<()> {
        let sql = format!("UPDATE {} SET log_path = $1 WHERE id = $2", self.table);
        sqlx::query(&sql)
            .bind(path)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to set job log path", e)
            })?;
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        let sql = format!("SELECT 1 FROM {} LIMIT 1", self.table);
        sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Job table unreachable", e))
    }
}
