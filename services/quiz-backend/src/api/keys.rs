//! API key 管理

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use quiz_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use super::middleware::AuthUser;
use super::state::AppState;
use crate::api_key::{ApiKey, CreatedApiKey};

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub key_name: String,
    pub permission_level: String,
}

#[derive(Debug, Serialize)]
pub struct KeyList {
    pub api_keys: Vec<ApiKey>,
    pub count: usize,
}

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<KeyList>> {
    let api_keys = state.api_keys.list(auth.id()).await?;
    Ok(Json(KeyList {
        count: api_keys.len(),
        api_keys,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateKeyRequest>,
) -> AppResult<(StatusCode, Json<CreatedApiKey>)> {
    let created = state
        .api_keys
        .create(auth.id(), &req.key_name, &req.permission_level)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiKey>> {
    state
        .api_keys
        .get(id, auth.id())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("API key not found"))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.api_keys.delete(id, auth.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
