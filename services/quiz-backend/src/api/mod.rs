//! HTTP 接口
//!
//! `/v1/auth/{login,refresh,signup}` 公开，其余路由经过 [`auth_middleware`]，
//! `/v1/admin/*` 另外要求 `admin` 角色

mod admin;
mod auth;
mod feedback;
mod ios;
mod keys;
mod middleware;
mod quiz;
mod state;
mod translate;

pub use middleware::{AuthUser, auth_middleware, require_admin};
pub use state::AppState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

/// 构建业务路由（不含健康检查与通用中间件）
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/refresh", post(auth::refresh))
        .route("/v1/auth/signup", post(auth::signup));

    let admin = Router::new()
        .route(
            "/v1/admin/feedback",
            get(feedback::list).delete(feedback::bulk_delete),
        )
        .route(
            "/v1/admin/feedback/{id}",
            get(feedback::get)
                .patch(feedback::update)
                .delete(feedback::delete),
        )
        .route("/v1/admin/users", get(admin::list_users))
        .route("/v1/admin/users/{id}", delete(admin::delete_user))
        .route(
            "/v1/admin/users/{id}/roles",
            get(admin::user_roles).post(admin::assign_role),
        )
        .route(
            "/v1/admin/users/{id}/roles/{role}",
            delete(admin::remove_role),
        )
        .route("/v1/admin/roles", get(admin::list_roles))
        .route("/v1/admin/usage", get(admin::usage_all))
        .route("/v1/admin/usage/{service}", get(admin::usage_by_service))
        .route(
            "/v1/admin/usage/{service}/current",
            get(admin::usage_current),
        )
        .route(
            "/v1/admin/usage/month/{year}/{month}",
            get(admin::usage_by_month),
        )
        .route(
            "/v1/admin/translation-cache/cleanup",
            post(admin::cleanup_translation_cache),
        )
        .route("/v1/admin/questions/fix", post(quiz::fix))
        .route_layer(axum_middleware::from_fn(require_admin));

    let protected = Router::new()
        .route("/v1/auth/me", get(auth::me))
        .route("/v1/auth/profile", put(auth::update_profile))
        .route("/v1/auth/password", put(auth::change_password))
        .route("/v1/settings", put(auth::update_settings))
        .route("/v1/api-keys", get(keys::list).post(keys::create))
        .route("/v1/api-keys/{id}", get(keys::get).delete(keys::delete))
        .route("/v1/feedback", post(feedback::create))
        .route("/v1/translate", post(translate::translate))
        .route("/v1/translate/languages", get(translate::languages))
        .route(
            "/v1/ios/device-tokens",
            post(ios::register).get(ios::list).delete(ios::remove),
        )
        .route("/v1/ios/test-notification", post(ios::test_notification))
        .route("/v1/quiz/generate", post(quiz::generate))
        .route("/v1/quiz/chat", post(quiz::chat))
        .merge(admin)
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public.merge(protected).with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use chrono::Utc;
    use quiz_adapter_ai::{CompletionBackend, CompletionRequest};
    use quiz_adapter_apns::ApnsClient;
    use quiz_adapter_translate::NoopTranslator;
    use quiz_auth_core::{TokenService, hash_password};
    use quiz_common::UserId;
    use quiz_config::{AiConfig, AuthConfig, TranslationConfig};
    use quiz_errors::AppResult;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::api_key::{ApiKey, ApiKeyService, MockApiKeyRepository, generate_raw_key};
    use crate::feedback::{FeedbackReport, FeedbackService, MockFeedbackRepository};
    use crate::notification::NotificationService;
    use crate::prompt::QuestionGenerator;
    use crate::translation::{MockTranslationCacheRepository, TranslationService};
    use crate::usage::NoopUsageTracker;
    use crate::user::{MockUserRepository, ROLE_ADMIN, Role, SignupPolicy, User, UserService};

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
            Ok(request.prompt.clone())
        }
    }

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(
            "router-test-secret-0123456789abcdef",
            3600,
            7200,
            "quizapp",
            "quizapp-api",
        ))
    }

    fn user(id: i64, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            email: None,
            password_hash: None,
            timezone: "UTC".to_string(),
            preferred_language: Some("italian".to_string()),
            current_level: Some("A1".to_string()),
            ai_enabled: false,
            ai_provider: None,
            ai_model: None,
            last_active: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            roles: vec![],
        }
    }

    fn admin_role() -> Role {
        Role {
            id: 2,
            name: ROLE_ADMIN.to_string(),
            description: "Administrator".to_string(),
            created_at: Utc::now(),
        }
    }

    /// 用户 1 为普通用户，用户 9 为管理员
    fn user_repo() -> MockUserRepository {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().returning(|id| {
            Ok(match id.as_i64() {
                1 => Some(user(1, "alice")),
                9 => Some(user(9, "root")),
                _ => None,
            })
        });
        repo.expect_roles_for().returning(|id| {
            Ok(if id.as_i64() == 9 {
                vec![admin_role()]
            } else {
                vec![]
            })
        });
        repo
    }

    struct Fixture {
        users: MockUserRepository,
        api_keys: MockApiKeyRepository,
        feedback: MockFeedbackRepository,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self {
                users: user_repo(),
                api_keys: MockApiKeyRepository::new(),
                feedback: MockFeedbackRepository::new(),
            }
        }
    }

    impl Fixture {
        fn app(self) -> Router {
            let users: Arc<dyn crate::user::UserRepository> = Arc::new(self.users);
            let translation = TranslationService::new(
                TranslationConfig::default(),
                HashMap::new(),
                Arc::new(NoopTranslator),
                Arc::new(MockTranslationCacheRepository::new()),
                Arc::new(NoopUsageTracker),
            );
            let questions =
                QuestionGenerator::new(AiConfig::default(), Arc::new(EchoBackend), None, HashMap::new())
                    .unwrap();

            router(AppState {
                tokens: tokens(),
                users: Arc::new(UserService::new(users.clone())),
                signup: Arc::new(SignupPolicy::from_config(&AuthConfig::default())),
                api_keys: Arc::new(ApiKeyService::new(Arc::new(self.api_keys))),
                feedback: Arc::new(FeedbackService::new(Arc::new(self.feedback))),
                usage: Arc::new(NoopUsageTracker),
                translation: Arc::new(translation),
                questions: Arc::new(questions),
                notifications: Arc::new(NotificationService::new(
                    users,
                    Arc::new(ApnsClient::disabled()),
                )),
            })
        }
    }

    fn bearer(id: i64, username: &str) -> String {
        let token = tokens()
            .generate_access_token(UserId(id), username, vec![])
            .unwrap();
        format!("Bearer {}", token)
    }

    fn stored_key(raw: &str, level: &str, user_id: i64) -> ApiKey {
        ApiKey {
            id: 5,
            user_id,
            key_name: "ci".to_string(),
            key_hash: hash_password(raw).unwrap(),
            key_prefix: raw[..12].to_string(),
            permission_level: level.to_string(),
            last_used_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let app = Fixture::default().app();
        let response = app
            .oneshot(Request::get("/v1/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Unauthorized: Authentication required");
    }

    #[tokio::test]
    async fn test_me_with_jwt() {
        let app = Fixture::default().app();
        let response = app
            .oneshot(
                Request::get("/v1/auth/me")
                    .header(header::AUTHORIZATION, bearer(1, "alice"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], "alice");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_jwt_for_deleted_user() {
        let app = Fixture::default().app();
        let response = app
            .oneshot(
                Request::get("/v1/auth/me")
                    .header(header::AUTHORIZATION, bearer(404, "ghost"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_readonly_key_cannot_post() {
        let raw = generate_raw_key();
        let key = stored_key(&raw, "readonly", 1);
        let mut fixture = Fixture::default();
        fixture
            .api_keys
            .expect_find_by_prefix()
            .returning(move |_| Ok(vec![key.clone()]));

        let response = fixture
            .app()
            .oneshot(
                Request::post("/v1/feedback")
                    .header(header::AUTHORIZATION, format!("Bearer {}", raw))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"feedback_text":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(
            body["detail"],
            "Forbidden: This API key does not have permission for this operation"
        );
    }

    #[tokio::test]
    async fn test_readonly_key_via_query_can_get() {
        let raw = generate_raw_key();
        let key = stored_key(&raw, "readonly", 1);
        let mut fixture = Fixture::default();
        fixture
            .api_keys
            .expect_find_by_prefix()
            .returning(move |_| Ok(vec![key.clone()]));
        fixture.api_keys.expect_touch_last_used().returning(|_| Ok(()));

        let response = fixture
            .app()
            .oneshot(
                Request::get(format!("/v1/auth/me?api_key={}", raw))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_api_key() {
        let mut fixture = Fixture::default();
        fixture.api_keys.expect_find_by_prefix().returning(|_| Ok(vec![]));

        let response = fixture
            .app()
            .oneshot(
                Request::get("/v1/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", generate_raw_key()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Unauthorized: Invalid API key");
    }

    #[tokio::test]
    async fn test_api_key_for_missing_user() {
        let raw = generate_raw_key();
        let key = stored_key(&raw, "full", 404);
        let mut fixture = Fixture::default();
        fixture
            .api_keys
            .expect_find_by_prefix()
            .returning(move |_| Ok(vec![key.clone()]));

        let response = fixture
            .app()
            .oneshot(
                Request::get("/v1/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", raw))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_role() {
        let response = Fixture::default()
            .app()
            .oneshot(
                Request::get("/v1/admin/usage")
                    .header(header::AUTHORIZATION, bearer(1, "alice"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = Fixture::default()
            .app()
            .oneshot(
                Request::get("/v1/admin/usage")
                    .header(header::AUTHORIZATION, bearer(9, "root"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "usage": [] }));
    }

    #[tokio::test]
    async fn test_feedback_created() {
        let mut fixture = Fixture::default();
        fixture.feedback.expect_insert().returning(|user_id, text, kind, context, _| {
            Ok(FeedbackReport {
                id: 11,
                user_id: user_id.as_i64(),
                feedback_text: text.to_string(),
                feedback_type: kind.to_string(),
                context_data: context.clone(),
                screenshot_data: None,
                screenshot_url: None,
                status: "new".to_string(),
                admin_notes: None,
                assigned_to_user_id: None,
                resolved_at: None,
                resolved_by_user_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        });

        let response = fixture
            .app()
            .oneshot(
                Request::post("/v1/feedback")
                    .header(header::AUTHORIZATION, bearer(1, "alice"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"feedback_text":"Typo in question 3"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["feedback_type"], "general");
        assert_eq!(body["status"], "new");
    }

    #[tokio::test]
    async fn test_translate_disabled_code() {
        let response = Fixture::default()
            .app()
            .oneshot(
                Request::post("/v1/translate")
                    .header(header::AUTHORIZATION, bearer(1, "alice"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"text":"ciao","source_language":"it","target_language":"en"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["code"], "TRANSLATION_SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_quiz_requires_ai_settings() {
        let response = Fixture::default()
            .app()
            .oneshot(
                Request::post("/v1/quiz/chat")
                    .header(header::AUTHORIZATION, bearer(1, "alice"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"language":"italian","level":"A1","user_message":"ciao"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_test_notification_when_push_disabled() {
        let response = Fixture::default()
            .app()
            .oneshot(
                Request::post("/v1/ios/test-notification")
                    .header(header::AUTHORIZATION, bearer(1, "alice"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
