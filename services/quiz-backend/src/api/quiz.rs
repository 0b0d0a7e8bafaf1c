//! AI 出题与对话

use axum::{Json, extract::State};
use quiz_errors::AppResult;
use serde::Serialize;

use super::middleware::AuthUser;
use super::state::AppState;
use crate::prompt::{ChatRequest, FixRequest, GeneratedQuestion, GenerationRequest};

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

pub async fn generate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<GenerationRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let ai = state.users.ai_config_for(&auth.user).await?;
    let questions = state.questions.generate(&ai, &request).await?;
    Ok(Json(GenerateResponse { questions }))
}

pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let ai = state.users.ai_config_for(&auth.user).await?;
    let response = state.questions.chat(&ai, &request).await?;
    Ok(Json(ChatResponse { response }))
}

/// 管理员用自己的 AI 设置修复被举报的题目
pub async fn fix(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<FixRequest>,
) -> AppResult<Json<GeneratedQuestion>> {
    let ai = state.users.ai_config_for(&auth.user).await?;
    Ok(Json(state.questions.fix_question(&ai, &request).await?))
}
