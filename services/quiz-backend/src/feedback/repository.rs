//! 反馈 Repository

use async_trait::async_trait;
use quiz_common::{Pagination, UserId};
use quiz_errors::{AppError, AppResult};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::model::{FeedbackFilter, FeedbackReport, FeedbackUpdate};

const FEEDBACK_COLUMNS: &str = "id, user_id, feedback_text, feedback_type, context_data, \
     screenshot_data, screenshot_url, status, admin_notes, assigned_to_user_id, resolved_at, \
     resolved_by_user_id, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn insert(
        &self,
        user_id: UserId,
        text: &str,
        feedback_type: &str,
        context_data: &Value,
        screenshot_data: Option<String>,
    ) -> AppResult<FeedbackReport>;

    async fn find(&self, id: i64) -> AppResult<Option<FeedbackReport>>;

    async fn list(
        &self,
        pagination: Pagination,
        filter: &FeedbackFilter,
    ) -> AppResult<(Vec<FeedbackReport>, i64)>;

    /// 只更新给出的列，记录不存在时返回 `None`
    async fn update(&self, id: i64, update: &FeedbackUpdate) -> AppResult<Option<FeedbackReport>>;

    async fn delete(&self, id: i64) -> AppResult<u64>;

    async fn delete_by_status(&self, status: &str) -> AppResult<u64>;

    async fn delete_all(&self) -> AppResult<u64>;
}

pub struct PostgresFeedbackRepository {
    pool: PgPool,
}

impl PostgresFeedbackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a FeedbackFilter) {
    builder.push(" WHERE 1=1");
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(kind) = filter.feedback_type.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND feedback_type = ").push_bind(kind);
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
}

#[async_trait]
impl FeedbackRepository for PostgresFeedbackRepository {
    async fn insert(
        &self,
        user_id: UserId,
        text: &str,
        feedback_type: &str,
        context_data: &Value,
        screenshot_data: Option<String>,
    ) -> AppResult<FeedbackReport> {
        let sql = format!(
            r#"
            INSERT INTO feedback_reports (user_id, feedback_text, feedback_type, context_data,
                                          screenshot_data, status)
            VALUES ($1, $2, $3, $4, $5, 'new')
            RETURNING {FEEDBACK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, FeedbackReport>(&sql)
            .bind(user_id.as_i64())
            .bind(text)
            .bind(feedback_type)
            .bind(context_data)
            .bind(screenshot_data)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create feedback: {}", e)))
    }

    async fn find(&self, id: i64) -> AppResult<Option<FeedbackReport>> {
        let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedback_reports WHERE id = $1");
        sqlx::query_as::<_, FeedbackReport>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to find feedback: {}", e)))
    }

    async fn list(
        &self,
        pagination: Pagination,
        filter: &FeedbackFilter,
    ) -> AppResult<(Vec<FeedbackReport>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM feedback_reports");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count feedback: {}", e)))?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {FEEDBACK_COLUMNS} FROM feedback_reports"));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit_i64())
            .push(" OFFSET ")
            .push_bind(pagination.offset_i64());

        let items = query
            .build_query_as::<FeedbackReport>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list feedback: {}", e)))?;

        Ok((items, total))
    }

    async fn update(&self, id: i64, update: &FeedbackUpdate) -> AppResult<Option<FeedbackReport>> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE feedback_reports SET updated_at = NOW()");
        if let Some(status) = &update.status {
            query.push(", status = ").push_bind(status);
        }
        if let Some(notes) = &update.admin_notes {
            query.push(", admin_notes = ").push_bind(notes);
        }
        if let Some(assignee) = update.assigned_to_user_id {
            query.push(", assigned_to_user_id = ").push_bind(assignee);
        }
        if let Some(resolved_at) = update.resolved_at {
            query.push(", resolved_at = ").push_bind(resolved_at);
        }
        if let Some(resolver) = update.resolved_by_user_id {
            query.push(", resolved_by_user_id = ").push_bind(resolver);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {FEEDBACK_COLUMNS}"));

        query
            .build_query_as::<FeedbackReport>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update feedback: {}", e)))
    }

    async fn delete(&self, id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM feedback_reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete feedback: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn delete_by_status(&self, status: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM feedback_reports WHERE status = $1")
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete feedback: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM feedback_reports")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete feedback: {}", e)))?;
        Ok(result.rows_affected())
    }
}
