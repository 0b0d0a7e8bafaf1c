//! 翻译接口

use axum::{Json, extract::State};
use quiz_errors::{AppError, ProblemDetails};
use serde::Serialize;
use tracing::error;

use super::middleware::AuthUser;
use super::state::AppState;
use crate::translation::{TranslateRequest, TranslateResponse};

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub languages: &'static [&'static str],
}

/// 翻译错误带业务错误码返回
fn translation_problem(err: AppError) -> ProblemDetails {
    let (status, code) = match &err {
        AppError::ServiceUnavailable(_) => (503, "TRANSLATION_SERVICE_UNAVAILABLE"),
        AppError::ResourceExhausted(_) => (429, "QUOTA_EXCEEDED"),
        _ => (400, "TRANSLATION_FAILED"),
    };
    if err.is_server_error() {
        error!(error = %err, "Translation failed");
    }
    err.to_problem_details().with_status(status).with_code(code)
}

pub async fn translate(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ProblemDetails> {
    state
        .translation
        .translate(request)
        .await
        .map(Json)
        .map_err(translation_problem)
}

pub async fn languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: state.translation.supported_languages(),
    })
}
