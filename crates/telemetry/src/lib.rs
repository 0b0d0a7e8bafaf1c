//! telemetry - 可观测性库

use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化 tracing
///
/// 重复初始化（例如测试中）会被忽略
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}

/// 初始化 Prometheus metrics
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// 记录外部 HTTP 调用
pub fn record_external_call(service: &str, operation: &str, success: bool, duration_ms: f64) {
    let labels = [
        ("service", service.to_string()),
        ("operation", operation.to_string()),
        ("success", success.to_string()),
    ];

    counter!("external_calls_total", &labels).increment(1);
    histogram!("external_call_duration_ms", &labels).record(duration_ms);
}

/// 记录缓存命中情况
pub fn record_cache_lookup(cache: &str, hit: bool) {
    let labels = [("cache", cache.to_string()), ("hit", hit.to_string())];
    counter!("cache_lookups_total", &labels).increment(1);
}

/// 外部调用计时器
pub struct CallTimer {
    start: Instant,
    service: &'static str,
    operation: &'static str,
}

impl CallTimer {
    pub fn new(service: &'static str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            service,
            operation,
        }
    }

    pub fn finish(self, success: bool) {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        record_external_call(self.service, self.operation, success, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder_is_noop() {
        // 未安装 recorder 时 metrics 宏不会 panic
        record_cache_lookup("translation", true);
        CallTimer::new("google_translate", "translate").finish(false);
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing("debug");
        init_tracing_json("info");
    }
}
