//! OpenAI 兼容的 chat completions 适配器

mod client;

pub use client::ChatCompletionClient;

use async_trait::async_trait;
use quiz_errors::AppResult;

/// 一次补全请求
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// 服务商基础 URL，例如 `http://localhost:11434/v1`
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    /// JSON schema 约束（仅支持 grammar 字段的服务商）
    pub grammar: Option<String>,
    /// 日志上下文
    pub username: String,
}

/// 补全后端
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String>;
}

/// 去掉模型输出中包裹 JSON 的 markdown 代码块
pub fn clean_json_response(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
