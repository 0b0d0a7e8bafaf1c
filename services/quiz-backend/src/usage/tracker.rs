//! 配额检查与用量记录

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use quiz_config::QuotaConfig;
use quiz_errors::{AppError, AppResult};
use tracing::{debug, warn};

use super::model::{UsageStats, month_start};
use super::repository::UsageRepository;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageTracker: Send + Sync {
    /// 本次用量会超出月度配额时返回 ResourceExhausted
    async fn check_quota(&self, service: &str, usage_type: &str, characters: i64) -> AppResult<()>;

    async fn record_usage(
        &self,
        service: &str,
        usage_type: &str,
        characters: i64,
        requests: i64,
    ) -> AppResult<()>;

    async fn current_month_usage(&self, service: &str, usage_type: &str) -> AppResult<UsageStats>;

    /// 配额关闭时为 0
    fn monthly_quota(&self, service: &str) -> i64;

    async fn list_all(&self) -> AppResult<Vec<UsageStats>>;

    async fn list_by_service(&self, service: &str) -> AppResult<Vec<UsageStats>>;

    async fn list_by_month(&self, year: i32, month: u32) -> AppResult<Vec<UsageStats>>;
}

/// 基于 `usage_stats` 表的配额服务
pub struct QuotaService {
    repo: Arc<dyn UsageRepository>,
    config: QuotaConfig,
}

impl QuotaService {
    pub fn new(repo: Arc<dyn UsageRepository>, config: QuotaConfig) -> Self {
        Self { repo, config }
    }
}

#[async_trait]
impl UsageTracker for QuotaService {
    async fn check_quota(&self, service: &str, usage_type: &str, characters: i64) -> AppResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let current = self.current_month_usage(service, usage_type).await?;
        let quota = self.monthly_quota(service);
        let new_total = current.characters_used + characters;
        debug!(service, usage_type, new_total, quota, "Checking monthly quota");

        if new_total > quota {
            warn!(service, usage_type, new_total, quota, "Monthly quota exceeded");
            return Err(AppError::resource_exhausted(format!(
                "Monthly quota exceeded for {} {} service. Used: {}/{} characters",
                service, usage_type, new_total, quota
            )));
        }
        Ok(())
    }

    async fn record_usage(
        &self,
        service: &str,
        usage_type: &str,
        characters: i64,
        requests: i64,
    ) -> AppResult<()> {
        self.repo
            .increment(service, usage_type, month_start(Utc::now()), characters, requests)
            .await
    }

    async fn current_month_usage(&self, service: &str, usage_type: &str) -> AppResult<UsageStats> {
        let month = month_start(Utc::now());
        Ok(self
            .repo
            .find(service, usage_type, month)
            .await?
            .unwrap_or_else(|| UsageStats::empty(service, usage_type, month)))
    }

    fn monthly_quota(&self, service: &str) -> i64 {
        if !self.config.enabled {
            return 0;
        }
        match service {
            "google" => self.config.google_monthly_quota,
            _ => self.config.default_monthly_quota,
        }
    }

    async fn list_all(&self) -> AppResult<Vec<UsageStats>> {
        self.repo.list_all().await
    }

    async fn list_by_service(&self, service: &str) -> AppResult<Vec<UsageStats>> {
        self.repo.list_by_service(service).await
    }

    async fn list_by_month(&self, year: i32, month: u32) -> AppResult<Vec<UsageStats>> {
        let first = first_day(year, month)?;
        self.repo.list_by_month(first).await
    }
}

fn first_day(year: i32, month: u32) -> AppResult<NaiveDate> {
    if !(1..=12).contains(&month) {
        return Err(AppError::validation(format!(
            "invalid month: {} (expected 1-12)",
            month
        )));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation(format!("invalid year: {}", year)))
}

/// 不限额、不记录
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageTracker;

#[async_trait]
impl UsageTracker for NoopUsageTracker {
    async fn check_quota(&self, _: &str, _: &str, _: i64) -> AppResult<()> {
        Ok(())
    }

    async fn record_usage(&self, _: &str, _: &str, _: i64, _: i64) -> AppResult<()> {
        Ok(())
    }

    async fn current_month_usage(&self, service: &str, usage_type: &str) -> AppResult<UsageStats> {
        Ok(UsageStats::empty(service, usage_type, month_start(Utc::now())))
    }

    fn monthly_quota(&self, _: &str) -> i64 {
        0
    }

    async fn list_all(&self) -> AppResult<Vec<UsageStats>> {
        Ok(Vec::new())
    }

    async fn list_by_service(&self, _: &str) -> AppResult<Vec<UsageStats>> {
        Ok(Vec::new())
    }

    async fn list_by_month(&self, year: i32, month: u32) -> AppResult<Vec<UsageStats>> {
        first_day(year, month)?;
        Ok(Vec::new())
    }
}
