//! 翻译服务
//!
//! 处理顺序：校验 → 语言规范化 → 缓存 → 配额 → 服务商 → 记录用量 → 写缓存

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use metrics::counter;
use quiz_adapter_translate::TranslationProvider;
use quiz_config::{LanguageLevelConfig, TranslationConfig};
use quiz_errors::{AppError, AppResult};
use quiz_telemetry::record_cache_lookup;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::{NewCacheEntry, TranslationCacheRepository, hash_text};
use super::languages::{normalize_language, supported_languages, validate_language_code};
use crate::usage::{USAGE_TRANSLATION, UsageTracker};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    #[serde(default)]
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub cached: bool,
}

pub struct TranslationService {
    config: TranslationConfig,
    language_levels: HashMap<String, LanguageLevelConfig>,
    provider: Arc<dyn TranslationProvider>,
    cache: Arc<dyn TranslationCacheRepository>,
    usage: Arc<dyn UsageTracker>,
}

/// 目前只接入了 Google Translate
pub const SUPPORTED_PROVIDERS: &[&str] = &["google"];

pub fn is_supported_provider(code: &str) -> bool {
    SUPPORTED_PROVIDERS.contains(&code)
}

impl TranslationService {
    pub fn new(
        config: TranslationConfig,
        language_levels: HashMap<String, LanguageLevelConfig>,
        provider: Arc<dyn TranslationProvider>,
        cache: Arc<dyn TranslationCacheRepository>,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            config,
            language_levels,
            provider,
            cache,
            usage,
        }
    }

    pub fn supported_languages(&self) -> &'static [&'static str] {
        supported_languages()
    }

    pub async fn translate(&self, request: TranslateRequest) -> AppResult<TranslateResponse> {
        if !self.config.enabled {
            return Err(AppError::service_unavailable("Translation service is disabled"));
        }

        let provider_code = self.config.default_provider.as_str();
        let provider_config = self.config.providers.get(provider_code).ok_or_else(|| {
            AppError::service_unavailable(format!(
                "Translation provider not configured: {}",
                provider_code
            ))
        })?;
        if !is_supported_provider(provider_code) {
            return Err(AppError::service_unavailable(format!(
                "Unsupported translation provider: {}",
                provider_code
            )));
        }

        let text = request.text.as_str();
        if text.trim().is_empty() {
            return Err(AppError::validation("Text cannot be empty"));
        }
        let characters = text.chars().count();
        if characters > provider_config.max_text_length {
            return Err(AppError::validation(format!(
                "Text cannot exceed {} characters",
                provider_config.max_text_length
            )));
        }

        let source = normalize_language(&request.source_language, &self.language_levels);
        let target = normalize_language(&request.target_language, &self.language_levels);
        if source.is_empty() || target.is_empty() {
            return Err(AppError::validation("Source and target language are required"));
        }
        validate_language_code(source)?;
        validate_language_code(target)?;

        let text_hash = hash_text(text);
        match self.cache.get(&text_hash, source, target).await {
            Ok(Some(entry)) => {
                record_cache_lookup("translation", true);
                counter!("translation_cache_hits_total").increment(1);
                counter!("translation_requests_total", "provider" => provider_code.to_string(), "cached" => "true")
                    .increment(1);
                debug!(source, target, "Translation cache hit");
                return Ok(TranslateResponse {
                    translated_text: entry.translated_text,
                    source_language: source.to_string(),
                    target_language: target.to_string(),
                    cached: true,
                });
            }
            Ok(None) => record_cache_lookup("translation", false),
            Err(e) => {
                record_cache_lookup("translation", false);
                warn!(error = %e, "Translation cache lookup failed, treating as miss");
            }
        }

        let characters = characters as i64;
        self.usage
            .check_quota(provider_code, USAGE_TRANSLATION, characters)
            .await?;

        let translated = self.provider.translate(text, source, target).await?;
        counter!("translation_requests_total", "provider" => provider_code.to_string(), "cached" => "false")
            .increment(1);

        if let Err(e) = self
            .usage
            .record_usage(provider_code, USAGE_TRANSLATION, characters, 1)
            .await
        {
            warn!(
                service = provider_code,
                usage_type = USAGE_TRANSLATION,
                characters,
                error = %e,
                "Failed to record translation usage"
            );
        }

        let entry = NewCacheEntry {
            text_hash,
            original_text: text.to_string(),
            source_language: source.to_string(),
            target_language: target.to_string(),
            translated_text: translated.clone(),
        };
        if let Err(e) = self
            .cache
            .save(&entry, Duration::days(self.config.cache_ttl_days))
            .await
        {
            warn!(error = %e, "Failed to save translation to cache");
        }

        info!(source, target, characters, "Text translated");
        Ok(TranslateResponse {
            translated_text: translated,
            source_language: source.to_string(),
            target_language: target.to_string(),
            cached: false,
        })
    }

    /// 清理过期缓存，返回删除条数
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        self.cache.delete_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::cache::{MockTranslationCacheRepository, TranslationCacheEntry};
    use crate::usage::{MockUsageTracker, NoopUsageTracker};
    use async_trait::async_trait;
    use chrono::Utc;
    use quiz_config::TranslationProviderConfig;

    mockall::mock! {
        Provider {}

        #[async_trait]
        impl TranslationProvider for Provider {
            fn code(&self) -> &str;
            async fn translate(&self, text: &str, source: &str, target: &str) -> AppResult<String>;
        }
    }

    fn config(enabled: bool) -> TranslationConfig {
        let provider = TranslationProviderConfig {
            name: "Google Translate".to_string(),
            code: "google".to_string(),
            base_url: "https://translation.googleapis.com".to_string(),
            api_endpoint: "/language/translate/v2".to_string(),
            api_key: None,
            max_text_length: 20,
            timeout_secs: 5,
        };
        TranslationConfig {
            enabled,
            providers: HashMap::from([("google".to_string(), provider)]),
            ..Default::default()
        }
    }

    fn levels() -> HashMap<String, LanguageLevelConfig> {
        HashMap::from([(
            "italian".to_string(),
            LanguageLevelConfig {
                code: "it".to_string(),
                levels: vec![],
                descriptions: HashMap::new(),
            },
        )])
    }

    fn request(text: &str, source: &str, target: &str) -> TranslateRequest {
        TranslateRequest {
            text: text.to_string(),
            source_language: source.to_string(),
            target_language: target.to_string(),
        }
    }

    fn service(
        enabled: bool,
        provider: MockProvider,
        cache: MockTranslationCacheRepository,
        usage: Arc<dyn UsageTracker>,
    ) -> TranslationService {
        TranslationService::new(
            config(enabled),
            levels(),
            Arc::new(provider),
            Arc::new(cache),
            usage,
        )
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let svc = service(
            false,
            MockProvider::new(),
            MockTranslationCacheRepository::new(),
            Arc::new(NoopUsageTracker),
        );
        let err = svc.translate(request("ciao", "it", "en")).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_provider_config() {
        let mut cfg = config(true);
        cfg.default_provider = "deepl".to_string();
        let svc = TranslationService::new(
            cfg,
            levels(),
            Arc::new(MockProvider::new()),
            Arc::new(MockTranslationCacheRepository::new()),
            Arc::new(NoopUsageTracker),
        );
        let err = svc.translate(request("ciao", "it", "en")).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_unsupported_provider_code() {
        let mut cfg = config(true);
        let google = cfg.providers["google"].clone();
        cfg.providers.insert("deepl".to_string(), google);
        cfg.default_provider = "deepl".to_string();
        let svc = TranslationService::new(
            cfg,
            levels(),
            Arc::new(MockProvider::new()),
            Arc::new(MockTranslationCacheRepository::new()),
            Arc::new(NoopUsageTracker),
        );
        let err = svc.translate(request("ciao", "it", "en")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Service unavailable: Unsupported translation provider: deepl"
        );
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let svc = service(
            true,
            MockProvider::new(),
            MockTranslationCacheRepository::new(),
            Arc::new(NoopUsageTracker),
        );
        let cases = [
            request("   ", "it", "en"),
            request("this text is far too long for the limit", "it", "en"),
            request("ciao", "", "en"),
            request("ciao", "it", "e"),
            request("ciao", "it", "en_US"),
        ];
        for case in cases {
            let err = svc.translate(case).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "unexpected: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider_and_quota() {
        let mut cache = MockTranslationCacheRepository::new();
        cache
            .expect_get()
            .withf(|hash, source, target| hash == hash_text("ciao") && source == "it" && target == "en")
            .returning(|hash, source, target| {
                Ok(Some(TranslationCacheEntry {
                    id: 1,
                    text_hash: hash.to_string(),
                    original_text: "ciao".to_string(),
                    source_language: source.to_string(),
                    target_language: target.to_string(),
                    translated_text: "hello".to_string(),
                    created_at: Utc::now(),
                    expires_at: Utc::now(),
                }))
            });
        let mut provider = MockProvider::new();
        provider.expect_translate().never();
        let mut usage = MockUsageTracker::new();
        usage.expect_check_quota().never();

        let svc = service(true, provider, cache, Arc::new(usage));
        let out = svc.translate(request("ciao", "Italian", "en")).await.unwrap();
        assert!(out.cached);
        assert_eq!(out.translated_text, "hello");
        assert_eq!(out.source_language, "it");
    }

    #[tokio::test]
    async fn test_cache_miss_calls_provider_and_records() {
        let mut cache = MockTranslationCacheRepository::new();
        cache.expect_get().returning(|_, _, _| Ok(None));
        cache
            .expect_save()
            .withf(|entry, ttl| entry.translated_text == "hello" && *ttl == Duration::days(30))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut provider = MockProvider::new();
        provider
            .expect_translate()
            .withf(|text, source, target| text == "ciao" && source == "it" && target == "en")
            .returning(|_, _, _| Ok("hello".to_string()));

        let mut usage = MockUsageTracker::new();
        usage
            .expect_check_quota()
            .withf(|service, kind, chars| service == "google" && kind == "translation" && *chars == 4)
            .returning(|_, _, _| Ok(()));
        usage
            .expect_record_usage()
            .times(1)
            .returning(|_, _, _, _| Err(AppError::database("down")));

        let svc = service(true, provider, cache, Arc::new(usage));
        let out = svc.translate(request("ciao", "it", "en")).await.unwrap();
        assert!(!out.cached);
        assert_eq!(out.translated_text, "hello");
    }

    #[tokio::test]
    async fn test_cache_error_is_a_miss() {
        let mut cache = MockTranslationCacheRepository::new();
        cache
            .expect_get()
            .returning(|_, _, _| Err(AppError::database("timeout")));
        cache
            .expect_save()
            .returning(|_, _| Err(AppError::database("timeout")));

        let mut provider = MockProvider::new();
        provider
            .expect_translate()
            .returning(|_, _, _| Ok("hello".to_string()));

        let svc = service(true, provider, cache, Arc::new(NoopUsageTracker));
        let out = svc.translate(request("ciao", "it", "en")).await.unwrap();
        assert_eq!(out.translated_text, "hello");
    }

    #[tokio::test]
    async fn test_quota_blocks_provider_call() {
        let mut cache = MockTranslationCacheRepository::new();
        cache.expect_get().returning(|_, _, _| Ok(None));
        let mut provider = MockProvider::new();
        provider.expect_translate().never();
        let mut usage = MockUsageTracker::new();
        usage
            .expect_check_quota()
            .returning(|_, _, _| Err(AppError::resource_exhausted("Monthly quota exceeded")));

        let svc = service(true, provider, cache, Arc::new(usage));
        let err = svc.translate(request("ciao", "it", "en")).await.unwrap_err();
        assert_eq!(err.status_code(), 429);
    }
}
