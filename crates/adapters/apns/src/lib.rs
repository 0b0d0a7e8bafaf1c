//! APNs 推送适配器
//!
//! 使用 token-based 认证（.p8 密钥签发 ES256 provider token）通过 HTTP/2 推送

mod client;
mod payload;
mod token;

pub use client::ApnsClient;
pub use payload::build_payload;

use async_trait::async_trait;
use quiz_errors::AppResult;
use serde_json::Value;

/// 单次推送结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// APNs 已接收
    Sent { apns_id: Option<String> },
    /// 设备令牌失效，调用方应删除
    InvalidToken { reason: String },
    /// 推送未启用，未发送
    Skipped,
}

/// 推送发送接口
#[async_trait]
pub trait PushSender: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// 向单个设备推送，payload 为原始 JSON（见 [`build_payload`]）
    async fn send(&self, device_token: &str, payload: &Value) -> AppResult<PushOutcome>;
}

/// 日志中只保留设备令牌前 20 个字符
pub fn redact_token(token: &str) -> String {
    match token.char_indices().nth(20) {
        Some((idx, _)) => format!("{}...", &token[..idx]),
        None => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_token() {
        let token = "a".repeat(64);
        assert_eq!(redact_token(&token), format!("{}...", "a".repeat(20)));
        assert_eq!(redact_token("short"), "short");
    }
}
