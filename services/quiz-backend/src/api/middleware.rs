//! 认证中间件与提取器
//!
//! 支持两种凭据：
//! - `Authorization: Bearer <jwt>`
//! - API key：`Authorization: Bearer qapp_...` 或查询参数 `api_key`

use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use quiz_common::UserId;
use quiz_errors::{AppError, AppResult};
use tracing::{debug, warn};

use super::state::AppState;
use crate::api_key::{ApiKeyService, KEY_PREFIX};
use crate::error::AuthError;
use crate::user::{ROLE_ADMIN, User};

/// 已认证的请求主体
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// 通过 API key 认证时的 key id
    pub api_key_id: Option<i64>,
}

impl AuthUser {
    pub fn id(&self) -> UserId {
        UserId(self.user.id)
    }

    pub fn is_admin(&self) -> bool {
        self.user.has_role(ROLE_ADMIN)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AuthError::MissingCredentials.into())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Credential {
    Jwt(String),
    ApiKey(String),
}

fn credential(request: &Request) -> Option<Credential> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(if token.starts_with(KEY_PREFIX) {
            Credential::ApiKey(token.to_string())
        } else {
            Credential::Jwt(token.to_string())
        });
    }

    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove("api_key"))
        .map(Credential::ApiKey)
}

async fn load_user(state: &AppState, id: UserId) -> AppResult<User> {
    state.users.get_user_by_id(id).await?.ok_or_else(|| {
        warn!(user_id = %id, "Credential refers to a missing user");
        AppError::unauthorized("user not found")
    })
}

/// 认证中间件，成功后把 [`AuthUser`] 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = match credential(&request) {
        Some(Credential::Jwt(token)) => {
            let claims = state.tokens.validate_access_token(&token).map_err(|e| {
                debug!(error = %e, "Access token rejected");
                e
            })?;
            let user = load_user(&state, claims.user_id()?).await?;
            AuthUser {
                user,
                api_key_id: None,
            }
        }
        Some(Credential::ApiKey(raw)) => {
            let key = state.api_keys.validate(&raw).await.map_err(|e| {
                warn!(error = %e, "API key rejected");
                e
            })?;
            if !ApiKeyService::can_perform_method(&key.permission_level, request.method()) {
                warn!(key_id = key.id, method = %request.method(), "API key lacks permission");
                return Err(AuthError::ApiKeyForbidden.into());
            }
            let user = load_user(&state, UserId(key.user_id)).await?;

            let api_keys = state.api_keys.clone();
            let key_id = key.id;
            tokio::spawn(async move { api_keys.touch_last_used(key_id).await });

            AuthUser {
                user,
                api_key_id: Some(key.id),
            }
        }
        None => return Err(AuthError::MissingCredentials.into()),
    };

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// 管理员路由守卫，须位于 [`auth_middleware`] 之内
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .is_some_and(AuthUser::is_admin);
    if !is_admin {
        return Err(AuthError::AdminRequired.into());
    }
    Ok(next.run(request).await)
}
