//! 翻译缓存
//!
//! 以原文 SHA-256 和语言对为键，过期时间写在行上

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quiz_errors::{AppError, AppResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

/// 默认缓存有效期（天）
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 30;

/// 原文的小写十六进制 SHA-256
pub fn hash_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TranslationCacheEntry {
    pub id: i64,
    pub text_hash: String,
    pub original_text: String,
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// 待写入的缓存条目
#[derive(Debug, Clone, PartialEq)]
pub struct NewCacheEntry {
    pub text_hash: String,
    pub original_text: String,
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationCacheRepository: Send + Sync {
    /// 未过期的缓存条目
    async fn get(
        &self,
        text_hash: &str,
        source: &str,
        target: &str,
    ) -> AppResult<Option<TranslationCacheEntry>>;

    /// 写入或刷新条目
    async fn save(&self, entry: &NewCacheEntry, ttl: Duration) -> AppResult<()>;

    async fn delete_expired(&self) -> AppResult<u64>;

    async fn count_expired(&self) -> AppResult<i64>;
}

pub struct PostgresTranslationCache {
    pool: PgPool,
}

impl PostgresTranslationCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TranslationCacheRepository for PostgresTranslationCache {
    async fn get(
        &self,
        text_hash: &str,
        source: &str,
        target: &str,
    ) -> AppResult<Option<TranslationCacheEntry>> {
        sqlx::query_as::<_, TranslationCacheEntry>(
            r#"
            SELECT id, text_hash, original_text, source_language, target_language,
                   translated_text, created_at, expires_at
            FROM translation_cache
            WHERE text_hash = $1 AND source_language = $2 AND target_language = $3
              AND expires_at > NOW()
            "#,
        )
        .bind(text_hash)
        .bind(source)
        .bind(target)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to read translation cache: {}", e)))
    }

    async fn save(&self, entry: &NewCacheEntry, ttl: Duration) -> AppResult<()> {
        let expires_at = Utc::now() + ttl;
        sqlx::query(
            r#"
            INSERT INTO translation_cache (text_hash, original_text, source_language,
                                           target_language, translated_text, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (text_hash, source_language, target_language)
            DO UPDATE SET translated_text = EXCLUDED.translated_text,
                          expires_at = EXCLUDED.expires_at,
                          created_at = NOW()
            "#,
        )
        .bind(&entry.text_hash)
        .bind(&entry.original_text)
        .bind(&entry.source_language)
        .bind(&entry.target_language)
        .bind(&entry.translated_text)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save translation cache: {}", e)))?;
        Ok(())
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM translation_cache WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to delete expired translations: {}", e))
            })?;
        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(deleted, "Expired translation cache entries removed");
        }
        Ok(deleted)
    }

    async fn count_expired(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM translation_cache WHERE expires_at <= NOW()",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count expired translations: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_text() {
        assert_eq!(
            hash_text("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(hash_text("Hello"), hash_text("hello"));
    }
}
