//! 反馈服务

use std::sync::Arc;

use quiz_common::{PagedResult, Pagination, UserId};
use quiz_errors::{AppError, AppResult};
use serde_json::{Value, json};
use tracing::info;

use super::model::{
    DEFAULT_FEEDBACK_TYPE, FeedbackFilter, FeedbackReport, FeedbackUpdate, NewFeedback,
    is_valid_status,
};
use super::repository::FeedbackRepository;

pub struct FeedbackService {
    repo: Arc<dyn FeedbackRepository>,
}

impl FeedbackService {
    pub fn new(repo: Arc<dyn FeedbackRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, user_id: UserId, input: NewFeedback) -> AppResult<FeedbackReport> {
        let text = input.feedback_text.trim();
        if text.is_empty() {
            return Err(AppError::validation("feedback_text is required"));
        }
        let feedback_type = input
            .feedback_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_FEEDBACK_TYPE);
        let context: Value = match input.context_data {
            Some(Value::Null) | None => json!({}),
            Some(value) => value,
        };

        let report = self
            .repo
            .insert(user_id, text, feedback_type, &context, input.screenshot_data)
            .await?;
        info!(
            feedback_id = report.id,
            user_id = %user_id,
            feedback_type = %report.feedback_type,
            "Feedback submitted"
        );
        Ok(report)
    }

    pub async fn get(&self, id: i64) -> AppResult<FeedbackReport> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found("feedback not found"))
    }

    pub async fn list(
        &self,
        pagination: Pagination,
        filter: &FeedbackFilter,
    ) -> AppResult<PagedResult<FeedbackReport>> {
        let (items, total) = self.repo.list(pagination, filter).await?;
        Ok(PagedResult::new(items, total.max(0) as u64, &pagination))
    }

    pub async fn update(&self, id: i64, update: FeedbackUpdate) -> AppResult<FeedbackReport> {
        if let Some(status) = update.status.as_deref() {
            if !is_valid_status(status) {
                return Err(AppError::validation(format!(
                    "invalid status: {} (expected new, in_progress, resolved or dismissed)",
                    status
                )));
            }
        }
        if update.is_empty() {
            return self.get(id).await;
        }

        let report = self
            .repo
            .update(id, &update)
            .await?
            .ok_or_else(|| AppError::not_found("feedback not found"))?;
        info!(feedback_id = id, status = %report.status, "Feedback updated");
        Ok(report)
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if self.repo.delete(id).await? == 0 {
            return Err(AppError::not_found("feedback not found"));
        }
        Ok(())
    }

    pub async fn delete_by_status(&self, status: &str) -> AppResult<u64> {
        if !is_valid_status(status) {
            return Err(AppError::validation(format!("invalid status: {}", status)));
        }
        let deleted = self.repo.delete_by_status(status).await?;
        info!(status, deleted, "Feedback deleted by status");
        Ok(deleted)
    }

    pub async fn delete_all(&self) -> AppResult<u64> {
        let deleted = self.repo.delete_all().await?;
        info!(deleted, "All feedback deleted");
        Ok(deleted)
    }
}
