//! APNs HTTP/2 客户端

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quiz_config::ApnsConfig;
use quiz_errors::{AppError, AppResult};
use quiz_telemetry::CallTimer;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::token::{TokenSigner, load_signing_key};
use crate::{PushOutcome, PushSender, build_payload, redact_token};

const PRODUCTION_HOST: &str = "https://api.push.apple.com";
const SANDBOX_HOST: &str = "https://api.sandbox.push.apple.com";

/// 令牌失效的拒绝原因
const INVALID_TOKEN_REASONS: [&str; 2] = ["Unregistered", "BadDeviceToken"];

#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    reason: String,
}

struct EnabledClient {
    http: reqwest::Client,
    signer: TokenSigner,
    host: &'static str,
    bundle_id: String,
    production: bool,
}

/// APNs 客户端，未启用时所有发送都是空操作
#[derive(Clone)]
pub struct ApnsClient {
    inner: Option<Arc<EnabledClient>>,
}

impl ApnsClient {
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn from_config(config: &ApnsConfig) -> AppResult<Self> {
        if !config.enabled {
            info!("APNS disabled in configuration");
            return Ok(Self::disabled());
        }

        for (field, value) in [
            ("key_id", &config.key_id),
            ("team_id", &config.team_id),
            ("bundle_id", &config.bundle_id),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::internal(format!(
                    "APNS {} is required when APNS is enabled",
                    field
                )));
            }
        }

        let key = load_signing_key(config)?;
        let signer = TokenSigner::new(key, &config.key_id, &config.team_id);
        // 启动时签一次，尽早暴露密钥问题
        signer.bearer()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build APNS client: {}", e)))?;

        info!(
            bundle_id = %config.bundle_id,
            production = config.production,
            key_id = %config.key_id,
            team_id = %config.team_id,
            "APNS client initialized"
        );

        Ok(Self {
            inner: Some(Arc::new(EnabledClient {
                http,
                signer,
                host: if config.production {
                    PRODUCTION_HOST
                } else {
                    SANDBOX_HOST
                },
                bundle_id: config.bundle_id.clone(),
                production: config.production,
            })),
        })
    }
}

#[async_trait]
impl PushSender for ApnsClient {
    fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    async fn send(&self, device_token: &str, payload: &Value) -> AppResult<PushOutcome> {
        let short = redact_token(device_token);
        let Some(client) = self.inner.as_ref() else {
            info!(device_token = %short, "APNS disabled, skipping notification");
            return Ok(PushOutcome::Skipped);
        };

        let bearer = client.signer.bearer()?;
        let url = format!("{}/3/device/{}", client.host, device_token);
        let timer = CallTimer::new("apns", "push");

        let response = client
            .http
            .post(&url)
            .header("authorization", format!("bearer {}", bearer))
            .header("apns-topic", &client.bundle_id)
            .header("apns-push-type", "alert")
            .json(&build_payload(payload))
            .send()
            .await
            .map_err(|e| {
                error!(device_token = %short, error = %e, "Failed to send APNS notification");
                AppError::external_service(format!("failed to send APNS notification: {}", e))
            });
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                timer.finish(false);
                return Err(e);
            }
        };

        let status = response.status().as_u16();
        let apns_id = response
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        let outcome = classify_response(status, &body, apns_id);
        timer.finish(matches!(outcome, Ok(PushOutcome::Sent { .. })));

        match &outcome {
            Ok(PushOutcome::Sent { apns_id }) => {
                info!(device_token = %short, apns_id = ?apns_id, "APNS notification sent successfully");
            }
            Ok(PushOutcome::InvalidToken { reason }) => {
                warn!(device_token = %short, status, reason = %reason, "APNS reported invalid device token");
            }
            Ok(PushOutcome::Skipped) => {}
            Err(e) => {
                error!(
                    device_token = %short,
                    status,
                    apns_env = if client.production { "production" } else { "sandbox" },
                    token_length = device_token.len(),
                    error = %e,
                    "APNS notification rejected"
                );
            }
        }
        outcome
    }
}

/// 将 APNs 响应映射为推送结果
fn classify_response(status: u16, body: &str, apns_id: Option<String>) -> AppResult<PushOutcome> {
    if status == 200 {
        return Ok(PushOutcome::Sent { apns_id });
    }

    let reason = serde_json::from_str::<RejectionBody>(body)
        .map(|b| b.reason)
        .unwrap_or_default();

    if status == 410 || INVALID_TOKEN_REASONS.contains(&reason.as_str()) {
        return Ok(PushOutcome::InvalidToken { reason });
    }

    Err(AppError::external_service(format!(
        "APNS notification failed: {} (status: {})",
        reason, status
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::TEST_KEY;
    use secrecy::Secret;
    use serde_json::json;

    fn enabled_config() -> ApnsConfig {
        ApnsConfig {
            enabled: true,
            key: Some(Secret::new(TEST_KEY.to_string())),
            key_id: "KEY123".to_string(),
            team_id: "TEAM456".to_string(),
            bundle_id: "dev.quizapp.ios".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_client_skips() {
        let client = ApnsClient::from_config(&ApnsConfig::default()).unwrap();
        assert!(!client.is_enabled());
        let outcome = client
            .send("0123456789abcdef0123456789abcdef", &json!({ "alert": "hi" }))
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::Skipped);
    }

    #[test]
    fn test_enabled_client_selects_host() {
        let client = ApnsClient::from_config(&enabled_config()).unwrap();
        assert!(client.is_enabled());
        assert_eq!(client.inner.as_ref().map(|c| c.host), Some(SANDBOX_HOST));

        let production = ApnsClient::from_config(&ApnsConfig {
            production: true,
            ..enabled_config()
        })
        .unwrap();
        assert_eq!(production.inner.as_ref().map(|c| c.host), Some(PRODUCTION_HOST));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = ApnsClient::from_config(&ApnsConfig {
            team_id: String::new(),
            ..enabled_config()
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("team_id is required"));
    }

    #[test]
    fn test_classify_response() {
        assert_eq!(
            classify_response(200, "", Some("id-1".to_string())).unwrap(),
            PushOutcome::Sent {
                apns_id: Some("id-1".to_string())
            }
        );
        assert_eq!(
            classify_response(410, r#"{"reason":"Unregistered"}"#, None).unwrap(),
            PushOutcome::InvalidToken {
                reason: "Unregistered".to_string()
            }
        );
        assert!(matches!(
            classify_response(400, r#"{"reason":"BadDeviceToken"}"#, None),
            Ok(PushOutcome::InvalidToken { .. })
        ));

        let err = classify_response(403, r#"{"reason":"InvalidProviderToken"}"#, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "External service error: APNS notification failed: InvalidProviderToken (status: 403)"
        );
    }
}
