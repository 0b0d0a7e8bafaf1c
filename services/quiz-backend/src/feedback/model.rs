//! 反馈模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_FEEDBACK_TYPE: &str = "general";

/// 反馈状态
pub const FEEDBACK_STATUSES: [&str; 4] = ["new", "in_progress", "resolved", "dismissed"];

pub fn is_valid_status(status: &str) -> bool {
    FEEDBACK_STATUSES.contains(&status)
}

/// 反馈报告
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeedbackReport {
    pub id: i64,
    pub user_id: i64,
    pub feedback_text: String,
    pub feedback_type: String,
    pub context_data: Value,
    pub screenshot_data: Option<String>,
    pub screenshot_url: Option<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub assigned_to_user_id: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFeedback {
    pub feedback_text: String,
    #[serde(default)]
    pub feedback_type: Option<String>,
    #[serde(default)]
    pub context_data: Option<Value>,
    #[serde(default)]
    pub screenshot_data: Option<String>,
}

/// 列表过滤条件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackFilter {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub feedback_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// 部分更新，`None` 表示不修改
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub assigned_to_user_id: Option<i64>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by_user_id: Option<i64>,
}

impl FeedbackUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.admin_notes.is_none()
            && self.assigned_to_user_id.is_none()
            && self.resolved_at.is_none()
            && self.resolved_by_user_id.is_none()
    }
}
