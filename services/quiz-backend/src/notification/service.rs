//! 推送分发服务

use std::sync::Arc;

use metrics::counter;
use quiz_adapter_apns::{PushOutcome, PushSender, redact_token};
use quiz_common::UserId;
use quiz_errors::{AppError, AppResult};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::user::UserRepository;

pub const DAILY_REMINDER: &str = "daily_reminder";

/// 一次分发的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// 因失效被删除的令牌数
    pub pruned: usize,
}

/// 预置的测试通知
pub fn test_payload(kind: &str) -> AppResult<Value> {
    match kind {
        DAILY_REMINDER => Ok(json!({
            "aps": {
                "alert": {
                    "title": "Time for your daily quiz! 🧠",
                    "body": "Tap to continue your learning journey."
                },
                "sound": "default"
            },
            "deep_link": "daily"
        })),
        other => Err(AppError::validation(format!(
            "unknown notification type: {}",
            other
        ))),
    }
}

pub struct NotificationService {
    users: Arc<dyn UserRepository>,
    sender: Arc<dyn PushSender>,
}

impl NotificationService {
    pub fn new(users: Arc<dyn UserRepository>, sender: Arc<dyn PushSender>) -> Self {
        Self { users, sender }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_enabled()
    }

    /// 推送到用户的所有设备，APNs 判定失效的令牌会被删除
    pub async fn send_to_user(&self, user_id: UserId, payload: &Value) -> AppResult<DispatchReport> {
        if !self.sender.is_enabled() {
            return Err(AppError::service_unavailable(
                "push notifications are not enabled",
            ));
        }

        let tokens = self.users.device_tokens(user_id).await?;
        if tokens.is_empty() {
            return Err(AppError::failed_precondition("no device tokens registered"));
        }

        let mut report = DispatchReport::default();
        for token in &tokens {
            let short = redact_token(&token.device_token);
            match self.sender.send(&token.device_token, payload).await {
                Ok(PushOutcome::Sent { .. }) => {
                    report.sent += 1;
                    counter!("push_notifications_total", "result" => "sent").increment(1);
                }
                Ok(PushOutcome::InvalidToken { reason }) => {
                    report.failed += 1;
                    counter!("push_notifications_total", "result" => "invalid_token").increment(1);
                    match self
                        .users
                        .delete_device_token(user_id, &token.device_token)
                        .await
                    {
                        Ok(n) if n > 0 => {
                            report.pruned += 1;
                            info!(user_id = %user_id, device_token = %short, reason = %reason, "Removed invalid device token");
                        }
                        Ok(_) => {
                            debug!(user_id = %user_id, device_token = %short, "Invalid device token already removed");
                        }
                        Err(e) => {
                            warn!(user_id = %user_id, device_token = %short, error = %e, "Failed to remove invalid device token");
                        }
                    }
                }
                Ok(PushOutcome::Skipped) => {
                    report.failed += 1;
                    counter!("push_notifications_total", "result" => "skipped").increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("push_notifications_total", "result" => "error").increment(1);
                    warn!(user_id = %user_id, device_token = %short, error = %e, "Failed to send notification");
                }
            }
        }

        info!(
            user_id = %user_id,
            devices = tokens.len(),
            sent = report.sent,
            failed = report.failed,
            pruned = report.pruned,
            "Notification dispatched"
        );

        if report.sent == 0 {
            return Err(AppError::external_service(
                "failed to send notification to any device",
            ));
        }
        Ok(report)
    }

    pub async fn send_test_notification(&self, user_id: UserId, kind: &str) -> AppResult<DispatchReport> {
        let payload = test_payload(kind)?;
        self.send_to_user(user_id, &payload).await
    }
}
