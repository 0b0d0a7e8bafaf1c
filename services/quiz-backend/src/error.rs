//! 服务错误定义

use quiz_errors::AppError;
use thiserror::Error;

/// 认证失败原因
///
/// 对外统一为少数几条消息，具体原因只进日志
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("API key is empty")]
    EmptyApiKey,

    #[error("invalid API key format")]
    MalformedApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("This API key does not have permission for this operation")]
    ApiKeyForbidden,

    #[error("Authentication required")]
    MissingCredentials,

    #[error("Admin access required")]
    AdminRequired,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ApiKeyForbidden | AuthError::AdminRequired => {
                AppError::forbidden(err.to_string())
            }
            _ => AppError::unauthorized(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_mapping() {
        let err: AppError = AuthError::ApiKeyForbidden.into();
        assert_eq!(err.status_code(), 403);
        let err: AppError = AuthError::InvalidApiKey.into();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), "Unauthorized: Invalid API key");
    }
}
