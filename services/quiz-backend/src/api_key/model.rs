//! API key 模型

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// key 前缀
pub const KEY_PREFIX: &str = "qapp_";
/// 随机部分的字节数
pub const KEY_RANDOM_BYTES: usize = 16;
/// 用于查找的前缀长度
pub const LOOKUP_PREFIX_LEN: usize = 12;

/// 权限级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Readonly,
    Full,
}

impl PermissionLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "readonly" => Some(Self::Readonly),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Full => "full",
        }
    }

    /// 只读 key 仅允许 GET 与 HEAD
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Self::Full => true,
            Self::Readonly => method == Method::GET || method == Method::HEAD,
        }
    }
}

/// API key 记录
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    pub key_name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    pub permission_level: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn level(&self) -> Option<PermissionLevel> {
        PermissionLevel::parse(&self.permission_level)
    }
}

/// 新建 key 的结果，原始 key 只在这里出现一次
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub key: ApiKey,
    #[serde(rename = "key")]
    pub raw_key: String,
}
