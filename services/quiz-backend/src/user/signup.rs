//! 注册策略

use quiz_config::AuthConfig;
use quiz_errors::{AppError, AppResult};

/// 关闭公开注册后，只放行白名单邮箱或域名
#[derive(Debug, Clone, Default)]
pub struct SignupPolicy {
    disabled: bool,
    allowed_domains: Vec<String>,
    allowed_emails: Vec<String>,
}

impl SignupPolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            disabled: config.signups_disabled,
            allowed_domains: config
                .allowed_domains
                .iter()
                .map(|d| d.trim().trim_start_matches('@').to_lowercase())
                .collect(),
            allowed_emails: config
                .allowed_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn check(&self, username: &str, email: Option<&str>) -> AppResult<()> {
        if username.trim().is_empty() {
            return Err(AppError::validation("username is required"));
        }
        if !self.disabled {
            return Ok(());
        }

        let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
        if !email.is_empty() {
            if self.allowed_emails.contains(&email) {
                return Ok(());
            }
            let domain_allowed = email
                .rsplit_once('@')
                .is_some_and(|(_, domain)| self.allowed_domains.iter().any(|d| d == domain));
            if domain_allowed {
                return Ok(());
            }
        }

        Err(AppError::forbidden("signups are disabled"))
    }
}
