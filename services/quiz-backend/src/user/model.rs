//! 用户领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// 用户
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub timezone: String,
    pub preferred_language: Option<String>,
    pub current_level: Option<String>,
    pub ai_enabled: bool,
    pub ai_provider: Option<String>,
    pub ai_model: Option<String>,
    pub last_active: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }
}

/// 角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// 创建用户的输入
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

/// 写入数据库的新用户记录（密码已哈希）
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserRecord {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub timezone: String,
    pub language: Option<String>,
    pub level: Option<String>,
}

/// 学习与 AI 设置
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub ai_provider: Option<String>,
    #[serde(default)]
    pub ai_model: Option<String>,
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl UserSettings {
    /// 关闭 AI 时清空服务商与模型
    pub fn normalized(mut self) -> Self {
        if !self.ai_enabled {
            self.ai_provider = None;
            self.ai_model = None;
            self.api_key = None;
        }
        self.api_key = self.api_key.filter(|k| !k.trim().is_empty());
        if self.ai_provider.as_deref().is_none_or(str::is_empty) {
            self.api_key = None;
        }
        self
    }
}

/// 用户列表过滤条件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub ai_enabled: Option<bool>,
}

/// iOS 设备令牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DeviceToken {
    pub id: i64,
    pub user_id: i64,
    pub device_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 调用 AI 服务所需的用户配置
#[derive(Debug, Clone, PartialEq)]
pub struct UserAiConfig {
    pub username: String,
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabling_ai_clears_provider() {
        let settings = UserSettings {
            ai_provider: Some("openai".to_string()),
            ai_model: Some("gpt-4o".to_string()),
            ai_enabled: false,
            api_key: Some("sk-1".to_string()),
            ..Default::default()
        }
        .normalized();
        assert!(settings.ai_provider.is_none());
        assert!(settings.ai_model.is_none());
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_blank_api_key_is_dropped() {
        let settings = UserSettings {
            ai_provider: Some("openai".to_string()),
            ai_enabled: true,
            api_key: Some("   ".to_string()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.ai_provider.as_deref(), Some("openai"));
        assert!(settings.api_key.is_none());
    }
}
