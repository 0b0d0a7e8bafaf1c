//! 登录、注册与个人设置

use axum::{Json, extract::State, http::StatusCode};
use quiz_common::UserId;
use quiz_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::middleware::AuthUser;
use super::state::AppState;
use crate::user::{NewUser, User, UserSettings};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: &'static str,
    pub user: User,
}

fn issue_tokens(state: &AppState, user: User) -> AppResult<LoginResponse> {
    let id = UserId(user.id);
    let access_token = state
        .tokens
        .generate_access_token(id, &user.username, user.role_names())?;
    let refresh_token = state.tokens.generate_refresh_token(id, &user.username)?;
    Ok(LoginResponse {
        access_token,
        refresh_token,
        expires_in: state.tokens.access_token_expires_in(),
        token_type: "Bearer",
        user,
    })
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state.users.authenticate(&req.username, &req.password).await?;
    let user = state
        .users
        .get_user_by_id(UserId(user.id))
        .await?
        .unwrap_or(user);

    if let Err(e) = state.users.update_last_active(UserId(user.id)).await {
        warn!(user_id = user.id, error = %e, "Failed to update last active time");
    }
    info!(user_id = user.id, username = %user.username, "User logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> AppResult<Json<LoginResponse>> {
    let claims = state.tokens.validate_refresh_token(&req.refresh_token)?;
    let user = state
        .users
        .get_user_by_id(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;
    Ok(Json(issue_tokens(&state, user)?))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    state.signup.check(&req.username, req.email.as_deref())?;
    if req.password.as_deref().is_none_or(|p| p.is_empty()) {
        return Err(AppError::validation("password is required"));
    }
    let user = state.users.create_user(req).await?;
    let user = state
        .users
        .get_user_by_id(UserId(user.id))
        .await?
        .unwrap_or(user);
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

async fn reload(state: &AppState, id: UserId) -> AppResult<Json<User>> {
    state
        .users
        .get_user_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(settings): Json<UserSettings>,
) -> AppResult<Json<User>> {
    state.users.update_settings(auth.id(), settings).await?;
    reload(&state, auth.id()).await
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<User>> {
    state
        .users
        .update_profile(auth.id(), &req.username, req.email, req.timezone)
        .await?;
    reload(&state, auth.id()).await
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PasswordRequest>,
) -> AppResult<StatusCode> {
    state
        .users
        .authenticate(&auth.user.username, &req.current_password)
        .await?;
    state.users.update_password(auth.id(), &req.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}
