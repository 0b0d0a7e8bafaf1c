//! Google Translate v2 客户端

use std::time::Duration;

use async_trait::async_trait;
use quiz_config::TranslationProviderConfig;
use quiz_errors::{AppError, AppResult};
use quiz_telemetry::CallTimer;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::TranslationProvider;

#[derive(Debug, Serialize)]
struct TranslateBody<'a> {
    q: [&'a str; 1],
    target: &'a str,
    source: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Google Translate 客户端
pub struct GoogleTranslateClient {
    http: reqwest::Client,
    code: String,
    endpoint: String,
    api_key: Option<Secret<String>>,
}

impl GoogleTranslateClient {
    pub fn new(config: &TranslationProviderConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            code: config.code.clone(),
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.api_endpoint
            ),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TranslationProvider for GoogleTranslateClient {
    fn code(&self) -> &str {
        &self.code
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> AppResult<String> {
        let api_key = self
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::service_unavailable("Google Translate API key not configured")
            })?;

        let body = TranslateBody {
            q: [text],
            target,
            source,
            format: "text",
        };

        debug!(source, target, chars = text.chars().count(), "Calling Google Translate");
        let timer = CallTimer::new("google_translate", "translate");

        let response = match self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                timer.finish(false);
                // 错误信息里可能带有包含 key 的 URL
                return Err(AppError::external_service(format!(
                    "translation request failed: {}",
                    e.without_url()
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            timer.finish(false);
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Google Translate returned an error");
            return Err(AppError::external_service(format!(
                "Google Translate API error: {} - {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: TranslateResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                timer.finish(false);
                return Err(AppError::external_service(format!(
                    "failed to decode translation response: {}",
                    e.without_url()
                )));
            }
        };

        timer.finish(true);
        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| {
                AppError::external_service("No translation returned from Google Translate API")
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{Json, Router, extract::Query, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config(base_url: &str, api_key: Option<&str>) -> TranslationProviderConfig {
        TranslationProviderConfig {
            name: "Google Translate".to_string(),
            code: "google".to_string(),
            base_url: base_url.to_string(),
            api_endpoint: "/language/translate/v2".to_string(),
            api_key: api_key.map(|k| Secret::new(k.to_string())),
            max_text_length: 5000,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_translate_success() {
        let app = Router::new().route(
            "/language/translate/v2",
            post(
                |Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    assert_eq!(q.get("key").map(String::as_str), Some("test-key"));
                    assert_eq!(body["q"], json!(["hola mundo"]));
                    assert_eq!(body["source"], "es");
                    assert_eq!(body["target"], "en");
                    assert_eq!(body["format"], "text");
                    Json(json!({
                        "data": { "translations": [{ "translatedText": "hello world" }] }
                    }))
                },
            ),
        );
        let base = serve(app).await;

        let client = GoogleTranslateClient::new(&config(&base, Some("test-key"))).unwrap();
        let out = client.translate("hola mundo", "es", "en").await.unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn test_error_status_is_external_service() {
        let app = Router::new().route(
            "/language/translate/v2",
            post(|| async { (StatusCode::FORBIDDEN, "quota exceeded") }),
        );
        let base = serve(app).await;

        let client = GoogleTranslateClient::new(&config(&base, Some("k"))).unwrap();
        let err = client.translate("hola", "es", "en").await.unwrap_err();
        match err {
            AppError::ExternalService(msg) => {
                assert_eq!(msg, "Google Translate API error: 403 - quota exceeded")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_translations() {
        let app = Router::new().route(
            "/language/translate/v2",
            post(|| async { Json(json!({ "data": { "translations": [] } })) }),
        );
        let base = serve(app).await;

        let client = GoogleTranslateClient::new(&config(&base, Some("k"))).unwrap();
        let err = client.translate("hola", "es", "en").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GoogleTranslateClient::new(&config("http://127.0.0.1:9", None)).unwrap();
        let err = client.translate("hola", "es", "en").await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }
}
