//! 用量 Repository

use async_trait::async_trait;
use chrono::NaiveDate;
use quiz_errors::{AppError, AppResult};
use sqlx::PgPool;

use super::model::UsageStats;

const STATS_COLUMNS: &str =
    "id, service_name, usage_type, usage_month, characters_used, requests_made, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn find(
        &self,
        service: &str,
        usage_type: &str,
        month: NaiveDate,
    ) -> AppResult<Option<UsageStats>>;

    /// 累加字符数与请求数
    async fn increment(
        &self,
        service: &str,
        usage_type: &str,
        month: NaiveDate,
        characters: i64,
        requests: i64,
    ) -> AppResult<()>;

    async fn list_all(&self) -> AppResult<Vec<UsageStats>>;

    async fn list_by_service(&self, service: &str) -> AppResult<Vec<UsageStats>>;

    async fn list_by_month(&self, month: NaiveDate) -> AppResult<Vec<UsageStats>>;
}

pub struct PostgresUsageRepository {
    pool: PgPool,
}

impl PostgresUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn find(
        &self,
        service: &str,
        usage_type: &str,
        month: NaiveDate,
    ) -> AppResult<Option<UsageStats>> {
        let sql = format!(
            "SELECT {STATS_COLUMNS} FROM usage_stats \
             WHERE service_name = $1 AND usage_type = $2 AND usage_month = $3"
        );
        sqlx::query_as::<_, UsageStats>(&sql)
            .bind(service)
            .bind(usage_type)
            .bind(month)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get usage stats: {}", e)))
    }

    async fn increment(
        &self,
        service: &str,
        usage_type: &str,
        month: NaiveDate,
        characters: i64,
        requests: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_stats (service_name, usage_type, usage_month, characters_used, requests_made)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (service_name, usage_type, usage_month)
            DO UPDATE SET
                characters_used = usage_stats.characters_used + EXCLUDED.characters_used,
                requests_made = usage_stats.requests_made + EXCLUDED.requests_made,
                updated_at = NOW()
            "#,
        )
        .bind(service)
        .bind(usage_type)
        .bind(month)
        .bind(characters)
        .bind(requests)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to record usage: {}", e)))?;
        Ok(())
    }

    async fn list_all(&self) -> AppResult<Vec<UsageStats>> {
        let sql = format!(
            "SELECT {STATS_COLUMNS} FROM usage_stats ORDER BY usage_month DESC, service_name, usage_type"
        );
        sqlx::query_as::<_, UsageStats>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list usage stats: {}", e)))
    }

    async fn list_by_service(&self, service: &str) -> AppResult<Vec<UsageStats>> {
        let sql = format!(
            "SELECT {STATS_COLUMNS} FROM usage_stats WHERE service_name = $1 \
             ORDER BY usage_month DESC, usage_type"
        );
        sqlx::query_as::<_, UsageStats>(&sql)
            .bind(service)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list usage stats: {}", e)))
    }

    async fn list_by_month(&self, month: NaiveDate) -> AppResult<Vec<UsageStats>> {
        let sql = format!(
            "SELECT {STATS_COLUMNS} FROM usage_stats WHERE usage_month = $1 \
             ORDER BY service_name, usage_type"
        );
        sqlx::query_as::<_, UsageStats>(&sql)
            .bind(month)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list usage stats: {}", e)))
    }
}
