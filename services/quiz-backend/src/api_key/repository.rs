//! API key Repository

use async_trait::async_trait;
use quiz_common::UserId;
use quiz_errors::{AppError, AppResult};
use sqlx::PgPool;

use super::model::ApiKey;

const KEY_COLUMNS: &str = "id, user_id, key_name, key_hash, key_prefix, permission_level, \
     last_used_at, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn insert(
        &self,
        user_id: UserId,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        permission_level: &str,
    ) -> AppResult<ApiKey>;

    async fn list_by_user(&self, user_id: UserId) -> AppResult<Vec<ApiKey>>;

    async fn find(&self, id: i64, user_id: UserId) -> AppResult<Option<ApiKey>>;

    /// 前缀相同的候选 key
    async fn find_by_prefix(&self, prefix: &str) -> AppResult<Vec<ApiKey>>;

    async fn delete(&self, id: i64, user_id: UserId) -> AppResult<u64>;

    async fn touch_last_used(&self, id: i64) -> AppResult<()>;
}

pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn insert(
        &self,
        user_id: UserId,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        permission_level: &str,
    ) -> AppResult<ApiKey> {
        let sql = format!(
            r#"
            INSERT INTO auth_api_keys (user_id, key_name, key_hash, key_prefix, permission_level)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {KEY_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ApiKey>(&sql)
            .bind(user_id.as_i64())
            .bind(name)
            .bind(key_hash)
            .bind(key_prefix)
            .bind(permission_level)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create API key: {}", e)))
    }

    async fn list_by_user(&self, user_id: UserId) -> AppResult<Vec<ApiKey>> {
        let sql = format!(
            "SELECT {KEY_COLUMNS} FROM auth_api_keys WHERE user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ApiKey>(&sql)
            .bind(user_id.as_i64())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list API keys: {}", e)))
    }

    async fn find(&self, id: i64, user_id: UserId) -> AppResult<Option<ApiKey>> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM auth_api_keys WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, ApiKey>(&sql)
            .bind(id)
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to find API key: {}", e)))
    }

    async fn find_by_prefix(&self, prefix: &str) -> AppResult<Vec<ApiKey>> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM auth_api_keys WHERE key_prefix = $1");
        sqlx::query_as::<_, ApiKey>(&sql)
            .bind(prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to look up API key: {}", e)))
    }

    async fn delete(&self, id: i64, user_id: UserId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM auth_api_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete API key: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn touch_last_used(&self, id: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE auth_api_keys SET last_used_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update API key usage: {}", e)))?;
        Ok(())
    }
}
