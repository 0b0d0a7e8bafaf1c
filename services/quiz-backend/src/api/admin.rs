//! 管理后台接口：用户、角色、用量、翻译缓存

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use quiz_common::{MAX_PAGE_SIZE, PagedResult, Pagination, UserId};
use quiz_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::feedback::DeletedCount;
use super::middleware::AuthUser;
use super::state::AppState;
use crate::usage::{USAGE_TRANSLATION, UsageStats};
use crate::user::{Role, User, UserFilter};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct UsageList {
    pub usage: Vec<UsageStats>,
}

#[derive(Debug, Serialize)]
pub struct CurrentUsage {
    #[serde(flatten)]
    pub stats: UsageStats,
    pub monthly_quota: i64,
}

fn non_empty(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<PagedResult<User>>> {
    let pagination = Pagination::parse(
        params.get("page").map(String::as_str),
        params.get("page_size").map(String::as_str),
        MAX_PAGE_SIZE,
    );
    let ai_enabled = match params.get("ai_enabled").map(String::as_str) {
        None | Some("") => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(_) => return Err(AppError::validation("ai_enabled must be true or false")),
    };
    let filter = UserFilter {
        search: non_empty(&params, "search"),
        language: non_empty(&params, "language"),
        level: non_empty(&params, "level"),
        ai_enabled,
    };
    Ok(Json(state.users.list_users(pagination, &filter).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if auth.user.id == id {
        return Err(AppError::validation("cannot delete your own account"));
    }
    state.users.delete_user(UserId(id)).await?;
    info!(admin_id = %auth.id(), user_id = id, "User deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_roles(State(state): State<AppState>) -> AppResult<Json<Vec<Role>>> {
    Ok(Json(state.users.list_roles().await?))
}

pub async fn user_roles(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Role>>> {
    Ok(Json(state.users.get_user_roles(UserId(id)).await?))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RoleRequest>,
) -> AppResult<StatusCode> {
    state.users.assign_role_by_name(UserId(id), req.role.trim()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_role(
    State(state): State<AppState>,
    Path((id, role)): Path<(i64, String)>,
) -> AppResult<StatusCode> {
    state.users.remove_role(UserId(id), &role).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn usage_all(State(state): State<AppState>) -> AppResult<Json<UsageList>> {
    Ok(Json(UsageList {
        usage: state.usage.list_all().await?,
    }))
}

pub async fn usage_by_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> AppResult<Json<UsageList>> {
    Ok(Json(UsageList {
        usage: state.usage.list_by_service(&service).await?,
    }))
}

pub async fn usage_by_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> AppResult<Json<UsageList>> {
    Ok(Json(UsageList {
        usage: state.usage.list_by_month(year, month).await?,
    }))
}

/// 当月用量与配额，`usage_type` 缺省为 translation
pub async fn usage_current(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<CurrentUsage>> {
    let usage_type = non_empty(&params, "usage_type").unwrap_or_else(|| USAGE_TRANSLATION.to_string());
    let stats = state.usage.current_month_usage(&service, &usage_type).await?;
    Ok(Json(CurrentUsage {
        monthly_quota: state.usage.monthly_quota(&service),
        stats,
    }))
}

pub async fn cleanup_translation_cache(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DeletedCount>> {
    let deleted = state.translation.cleanup_expired().await?;
    info!(admin_id = %auth.id(), deleted, "Translation cache cleanup triggered");
    Ok(Json(DeletedCount { deleted }))
}
