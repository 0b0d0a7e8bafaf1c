//! API key 服务

use std::sync::Arc;

use axum::http::Method;
use quiz_auth_core::{hash_password, verify_password};
use quiz_common::UserId;
use quiz_errors::{AppError, AppResult};
use rand::RngCore;
use tracing::{debug, info, warn};

use super::model::{
    ApiKey, CreatedApiKey, KEY_PREFIX, KEY_RANDOM_BYTES, LOOKUP_PREFIX_LEN, PermissionLevel,
};
use super::repository::ApiKeyRepository;
use crate::error::AuthError;

/// 生成原始 key
pub fn generate_raw_key() -> String {
    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", KEY_PREFIX, hex::encode(bytes))
}

/// 检查格式并返回查找前缀
fn lookup_prefix(raw: &str) -> Result<&str, AuthError> {
    if raw.is_empty() {
        return Err(AuthError::EmptyApiKey);
    }
    let Some(random) = raw.strip_prefix(KEY_PREFIX) else {
        return Err(AuthError::MalformedApiKey);
    };
    if random.len() != KEY_RANDOM_BYTES * 2 || !random.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AuthError::MalformedApiKey);
    }
    Ok(&raw[..LOOKUP_PREFIX_LEN])
}

pub struct ApiKeyService {
    repo: Arc<dyn ApiKeyRepository>,
}

impl ApiKeyService {
    pub fn new(repo: Arc<dyn ApiKeyRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        permission_level: &str,
    ) -> AppResult<CreatedApiKey> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Key name is required"));
        }
        let level = PermissionLevel::parse(permission_level).ok_or_else(|| {
            AppError::validation("Permission level must be 'readonly' or 'full'")
        })?;

        let raw_key = generate_raw_key();
        let hash = hash_password(&raw_key)?;
        let key = self
            .repo
            .insert(
                user_id,
                name,
                &hash,
                &raw_key[..LOOKUP_PREFIX_LEN],
                level.as_str(),
            )
            .await?;

        info!(user_id = %user_id, key_id = key.id, level = level.as_str(), "API key created");
        Ok(CreatedApiKey { key, raw_key })
    }

    pub async fn list(&self, user_id: UserId) -> AppResult<Vec<ApiKey>> {
        self.repo.list_by_user(user_id).await
    }

    pub async fn get(&self, id: i64, user_id: UserId) -> AppResult<Option<ApiKey>> {
        self.repo.find(id, user_id).await
    }

    pub async fn delete(&self, id: i64, user_id: UserId) -> AppResult<()> {
        if self.repo.delete(id, user_id).await? == 0 {
            return Err(AppError::not_found("API key not found"));
        }
        info!(user_id = %user_id, key_id = id, "API key deleted");
        Ok(())
    }

    /// 校验原始 key，返回匹配的记录
    pub async fn validate(&self, raw: &str) -> AppResult<ApiKey> {
        let prefix = lookup_prefix(raw)?;
        let candidates = self.repo.find_by_prefix(prefix).await?;
        debug!(prefix, candidates = candidates.len(), "Validating API key");

        candidates
            .into_iter()
            .find(|candidate| verify_password(raw, &candidate.key_hash))
            .ok_or_else(|| AuthError::InvalidApiKey.into())
    }

    /// 更新最后使用时间，失败只记录日志
    pub async fn touch_last_used(&self, id: i64) {
        if let Err(e) = self.repo.touch_last_used(id).await {
            warn!(key_id = id, error = %e, "Failed to update API key last used time");
        }
    }

    pub fn can_perform_method(level: &str, method: &Method) -> bool {
        PermissionLevel::parse(level).is_some_and(|l| l.allows(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_key::repository::MockApiKeyRepository;
    use chrono::Utc;

    fn stored(id: i64, raw: &str, level: &str) -> ApiKey {
        ApiKey {
            id,
            user_id: 42,
            key_name: "ci".to_string(),
            key_hash: hash_password(raw).unwrap(),
            key_prefix: raw[..LOOKUP_PREFIX_LEN].to_string(),
            permission_level: level.to_string(),
            last_used_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generated_key_format() {
        let key = generate_raw_key();
        assert!(key.starts_with("qapp_"));
        assert_eq!(key.len(), 37);
        assert!(key[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_raw_key());
    }

    #[test]
    fn test_lookup_prefix_rejects_bad_format() {
        assert_eq!(lookup_prefix(""), Err(AuthError::EmptyApiKey));
        assert_eq!(lookup_prefix("sk_0123"), Err(AuthError::MalformedApiKey));
        assert_eq!(lookup_prefix("qapp_abc"), Err(AuthError::MalformedApiKey));
        assert_eq!(
            lookup_prefix("qapp_zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(AuthError::MalformedApiKey)
        );
        let key = generate_raw_key();
        assert_eq!(lookup_prefix(&key).unwrap(), &key[..12]);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = ApiKeyService::new(Arc::new(MockApiKeyRepository::new()));

        let err = service.create(UserId(1), "  ", "full").await.unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Key name is required");

        let err = service.create(UserId(1), "ci", "admin").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Permission level must be 'readonly' or 'full'"
        );
    }

    #[tokio::test]
    async fn test_create_stores_prefix_and_hash() {
        let mut repo = MockApiKeyRepository::new();
        repo.expect_insert()
            .withf(|_, name, hash, prefix, level| {
                name == "ci" && hash.starts_with("$argon2") && prefix.len() == 12 && level == "readonly"
            })
            .returning(|user_id, name, hash, prefix, level| {
                Ok(ApiKey {
                    id: 1,
                    user_id: user_id.as_i64(),
                    key_name: name.to_string(),
                    key_hash: hash.to_string(),
                    key_prefix: prefix.to_string(),
                    permission_level: level.to_string(),
                    last_used_at: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
            });

        let service = ApiKeyService::new(Arc::new(repo));
        let created = service.create(UserId(3), "ci", "readonly").await.unwrap();
        assert!(created.raw_key.starts_with(&created.key.key_prefix));
        assert!(verify_password(&created.raw_key, &created.key.key_hash));
    }

    #[tokio::test]
    async fn test_validate_matches_candidate_hash() {
        let raw = generate_raw_key();
        let other = format!("{}{}", &raw[..LOOKUP_PREFIX_LEN], "0".repeat(25));
        let candidates = vec![stored(1, &other, "full"), stored(2, &raw, "readonly")];

        let mut repo = MockApiKeyRepository::new();
        let prefix = raw[..LOOKUP_PREFIX_LEN].to_string();
        repo.expect_find_by_prefix()
            .withf(move |p| p == prefix)
            .returning(move |_| Ok(candidates.clone()));

        let service = ApiKeyService::new(Arc::new(repo));
        let key = service.validate(&raw).await.unwrap();
        assert_eq!(key.id, 2);
    }

    #[tokio::test]
    async fn test_validate_unknown_key() {
        let mut repo = MockApiKeyRepository::new();
        repo.expect_find_by_prefix().returning(|_| Ok(vec![]));

        let service = ApiKeyService::new(Arc::new(repo));
        let err = service.validate(&generate_raw_key()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized: Invalid API key");
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let mut repo = MockApiKeyRepository::new();
        repo.expect_delete().returning(|_, _| Ok(0));

        let service = ApiKeyService::new(Arc::new(repo));
        let err = service.delete(9, UserId(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "Not found: API key not found");
    }

    #[tokio::test]
    async fn test_touch_swallows_errors() {
        let mut repo = MockApiKeyRepository::new();
        repo.expect_touch_last_used()
            .times(1)
            .returning(|_| Err(AppError::database("down")));

        let service = ApiKeyService::new(Arc::new(repo));
        service.touch_last_used(5).await;
    }

    #[test]
    fn test_can_perform_method() {
        assert!(ApiKeyService::can_perform_method("full", &Method::DELETE));
        assert!(ApiKeyService::can_perform_method("readonly", &Method::GET));
        assert!(!ApiKeyService::can_perform_method("readonly", &Method::PUT));
        assert!(!ApiKeyService::can_perform_method("bogus", &Method::GET));
    }
}
