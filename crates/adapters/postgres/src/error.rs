//! sqlx 错误映射

use quiz_errors::AppError;

/// 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";

/// 是否为唯一约束冲突
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

/// 将 sqlx 错误转换为 AppError，附带操作上下文
pub fn map_sqlx_error(context: &str, error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::RowNotFound => AppError::not_found(context.to_string()),
        ref e if is_unique_violation(e) => AppError::conflict(format!("{}: {}", context, e)),
        e => AppError::database(format!("{}: {}", context, e)),
    }
}
