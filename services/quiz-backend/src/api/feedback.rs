//! 反馈提交与管理

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use quiz_common::{MAX_PAGE_SIZE, PagedResult, Pagination};
use quiz_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::middleware::AuthUser;
use super::state::AppState;
use crate::feedback::{FeedbackFilter, FeedbackReport, FeedbackUpdate, NewFeedback};

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkDeleteQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub all: Option<bool>,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<NewFeedback>,
) -> AppResult<(StatusCode, Json<FeedbackReport>)> {
    let report = state.feedback.create(auth.id(), input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<PagedResult<FeedbackReport>>> {
    let pagination = Pagination::parse(
        params.get("page").map(String::as_str),
        params.get("page_size").map(String::as_str),
        MAX_PAGE_SIZE,
    );
    let user_id = match params.get("user_id") {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| AppError::validation("user_id must be an integer"))?,
        ),
        None => None,
    };
    let filter = FeedbackFilter {
        status: params.get("status").cloned().filter(|s| !s.is_empty()),
        feedback_type: params.get("feedback_type").cloned().filter(|s| !s.is_empty()),
        user_id,
    };
    Ok(Json(state.feedback.list(pagination, &filter).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<FeedbackReport>> {
    Ok(Json(state.feedback.get(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<FeedbackUpdate>,
) -> AppResult<Json<FeedbackReport>> {
    Ok(Json(state.feedback.update(id, update).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    state.feedback.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 按状态或全部删除，两者都未指定时拒绝
pub async fn bulk_delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<BulkDeleteQuery>,
) -> AppResult<Json<DeletedCount>> {
    let deleted = match (query.status.as_deref(), query.all) {
        (Some(status), _) if !status.is_empty() => state.feedback.delete_by_status(status).await?,
        (_, Some(true)) => state.feedback.delete_all().await?,
        _ => {
            return Err(AppError::validation(
                "specify status or all=true to delete feedback",
            ));
        }
    };
    info!(admin_id = %auth.id(), deleted, "Bulk deleted feedback");
    Ok(Json(DeletedCount { deleted }))
}
