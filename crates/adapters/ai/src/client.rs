//! HTTP 实现

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use quiz_errors::{AppError, AppResult};
use quiz_telemetry::record_external_call;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{CompletionBackend, CompletionRequest};

const USER_AGENT: &str = "quizapp/1.0";
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    grammar: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// chat completions 客户端
#[derive(Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build AI HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
        if request.model.is_empty() {
            return Err(AppError::validation("model is required"));
        }
        if request.prompt.is_empty() {
            return Err(AppError::validation("prompt cannot be empty"));
        }

        let url = format!("{}/chat/completions", request.base_url.trim_end_matches('/'));
        let body = ChatBody {
            model: &request.model,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: request.max_tokens,
            grammar: request.grammar.as_deref(),
        };

        debug!(
            user = %request.username,
            url = %url,
            model = %request.model,
            grammar = request.grammar.is_some(),
            "Starting AI request"
        );

        let mut builder = self.http.post(&url).json(&body);
        if let Some(key) = request.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let start = Instant::now();
        let result = send(builder).await;
        let elapsed = start.elapsed();
        let success = result.is_ok();

        let labels = [("model", request.model.clone()), ("success", success.to_string())];
        counter!("ai_requests_total", &labels).increment(1);
        histogram!("ai_request_duration_ms", &labels).record(elapsed.as_secs_f64() * 1000.0);
        record_external_call("ai", "chat_completion", success, elapsed.as_secs_f64() * 1000.0);

        match &result {
            Ok(content) => info!(
                user = %request.username,
                model = %request.model,
                duration_ms = elapsed.as_millis() as u64,
                response_len = content.len(),
                "AI request completed"
            ),
            Err(e) => warn!(
                user = %request.username,
                model = %request.model,
                duration_ms = elapsed.as_millis() as u64,
                error = %e,
                "AI request failed"
            ),
        }
        result
    }
}

async fn send(builder: reqwest::RequestBuilder) -> AppResult<String> {
    let response = builder
        .send()
        .await
        .map_err(|e| AppError::external_service(format!("AI HTTP request failed: {}", e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::external_service(format!("failed to read AI response: {}", e)))?;

    if !status.is_success() {
        return Err(AppError::external_service(format!(
            "API request failed with status {}: {}",
            status.as_u16(),
            text
        )));
    }

    let parsed: ChatResponse = serde_json::from_str(&text)
        .map_err(|e| AppError::external_service(format!("failed to decode AI response: {}", e)))?;

    if let Some(error) = parsed.error {
        return Err(AppError::external_service(format!("API error: {}", error.message)));
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| AppError::external_service("no choices in AI response"))?;

    if content.trim().is_empty() {
        return Err(AppError::external_service("empty content in AI response"));
    }
    Ok(content)
}
