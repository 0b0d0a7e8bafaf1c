//! Quiz backend 服务入口

use std::sync::Arc;
use std::time::Duration;

use quiz_adapter_ai::ChatCompletionClient;
use quiz_adapter_apns::{ApnsClient, PushSender};
use quiz_adapter_translate::{GoogleTranslateClient, NoopTranslator, TranslationProvider};
use quiz_backend::api::{self, AppState};
use quiz_backend::api_key::{ApiKeyService, PostgresApiKeyRepository};
use quiz_backend::feedback::{FeedbackService, PostgresFeedbackRepository};
use quiz_backend::migrations;
use quiz_backend::notification::NotificationService;
use quiz_backend::prompt::QuestionGenerator;
use quiz_backend::translation::{
    CacheCleanupTask, PostgresTranslationCache, TranslationCacheRepository, TranslationService,
    is_supported_provider,
};
use quiz_backend::usage::{PostgresUsageRepository, QuotaService, UsageTracker};
use quiz_backend::user::{PostgresUserRepository, SignupPolicy, UserRepository, UserService};
use quiz_bootstrap::Infrastructure;
use quiz_errors::AppResult;
use secrecy::ExposeSecret;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    quiz_bootstrap::run("config", migrations::all(), |infra: Infrastructure| async move {
        let state = build_state(&infra).await?;
        Ok(api::router(state))
    })
    .await
}

async fn build_state(infra: &Infrastructure) -> AppResult<AppState> {
    let config = infra.config();
    let pool = infra.postgres_pool();

    let user_repo: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(pool.clone()));
    let users = Arc::new(UserService::new(user_repo.clone()));

    if let (Some(username), Some(password)) = (
        config.server.admin_username.as_deref(),
        config.server.admin_password.as_ref(),
    ) {
        users
            .ensure_admin_user(username, password.expose_secret())
            .await?;
        info!(username, "Admin user ensured");
    }

    let usage: Arc<dyn UsageTracker> = Arc::new(QuotaService::new(
        Arc::new(PostgresUsageRepository::new(pool.clone())),
        config.translation.quota.clone(),
    ));

    let translation_config = &config.translation;
    let provider: Arc<dyn TranslationProvider> =
        match translation_config.providers.get(&translation_config.default_provider) {
            Some(provider) if is_supported_provider(&translation_config.default_provider) => {
                Arc::new(GoogleTranslateClient::new(provider)?)
            }
            Some(_) => {
                warn!(
                    provider = %translation_config.default_provider,
                    "Unsupported translation provider"
                );
                Arc::new(NoopTranslator)
            }
            None => {
                warn!(
                    provider = %translation_config.default_provider,
                    "Translation provider not configured"
                );
                Arc::new(NoopTranslator)
            }
        };

    let cache: Arc<dyn TranslationCacheRepository> =
        Arc::new(PostgresTranslationCache::new(pool.clone()));
    let translation = Arc::new(TranslationService::new(
        translation_config.clone(),
        config.language_levels.clone(),
        provider,
        cache.clone(),
        usage.clone(),
    ));

    let cleanup_hours = translation_config.cleanup_interval_hours.max(1);
    Arc::new(CacheCleanupTask::new(
        cache,
        Duration::from_secs(cleanup_hours * 3600),
    ))
    .start(infra.shutdown_token());

    let push: Arc<dyn PushSender> = match ApnsClient::from_config(&config.apns) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "APNS misconfigured, push notifications disabled");
            Arc::new(ApnsClient::disabled())
        }
    };

    let backend = ChatCompletionClient::new(Duration::from_secs(config.ai.request_timeout_secs))?;
    let questions = QuestionGenerator::new(
        config.ai.clone(),
        Arc::new(backend),
        config.variety.clone(),
        config.language_levels.clone(),
    )?;

    Ok(AppState {
        tokens: infra.token_service(),
        users,
        signup: Arc::new(SignupPolicy::from_config(&config.auth)),
        api_keys: Arc::new(ApiKeyService::new(Arc::new(PostgresApiKeyRepository::new(
            pool.clone(),
        )))),
        feedback: Arc::new(FeedbackService::new(Arc::new(
            PostgresFeedbackRepository::new(pool.clone()),
        ))),
        usage,
        translation,
        questions: Arc::new(questions),
        notifications: Arc::new(NotificationService::new(user_repo, push)),
    })
}
