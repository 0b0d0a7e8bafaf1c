//! 启动期重试
//!
//! 数据库等依赖在容器编排下可能晚于服务就绪，连接时按指数退避重试

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// 退避策略
#[derive(Debug, Clone)]
pub struct Backoff {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// 第 n 次失败后的等待时间（翻倍，封顶）
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// 连接类错误特征
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "timed out",
    "timeout",
    "temporarily unavailable",
    "too many connections",
    "could not connect",
    "broken pipe",
    "starting up",
];

/// 判断错误是否值得重试
pub fn is_transient(error: &str) -> bool {
    let lower = error.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// 对瞬时错误重试，非瞬时错误立即返回
pub async fn retry_transient<F, Fut, T, E>(
    backoff: &Backoff,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = operation_name, attempt = attempt + 1, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                attempt += 1;
                let message = e.to_string();
                if attempt >= backoff.max_attempts || !is_transient(&message) {
                    warn!(operation = operation_name, attempt, error = %message, "Giving up");
                    return Err(e);
                }
                let delay = backoff.delay_for_attempt(attempt - 1);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
