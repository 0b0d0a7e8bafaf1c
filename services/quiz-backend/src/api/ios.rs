//! iOS 设备令牌与测试推送

use axum::{Json, extract::State, http::StatusCode};
use quiz_errors::AppResult;
use serde::{Deserialize, Serialize};

use super::middleware::AuthUser;
use super::state::AppState;
use crate::notification::{DAILY_REMINDER, DispatchReport};
use crate::user::DeviceToken;

#[derive(Debug, Deserialize)]
pub struct DeviceTokenRequest {
    pub device_token: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceTokenList {
    pub device_tokens: Vec<DeviceToken>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestNotificationRequest {
    #[serde(default)]
    pub notification_type: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<DeviceTokenRequest>,
) -> AppResult<(StatusCode, Json<DeviceToken>)> {
    let token = state
        .users
        .register_device_token(auth.id(), &req.device_token)
        .await?;
    Ok((StatusCode::CREATED, Json(token)))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DeviceTokenList>> {
    let device_tokens = state.users.list_device_tokens(auth.id()).await?;
    Ok(Json(DeviceTokenList { device_tokens }))
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<DeviceTokenRequest>,
) -> AppResult<StatusCode> {
    state
        .users
        .remove_device_token(auth.id(), &req.device_token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn test_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<TestNotificationRequest>>,
) -> AppResult<Json<DispatchReport>> {
    let kind = body
        .and_then(|Json(b)| b.notification_type)
        .unwrap_or_else(|| DAILY_REMINDER.to_string());
    let report = state
        .notifications
        .send_test_notification(auth.id(), &kind)
        .await?;
    Ok(Json(report))
}
