use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

/// 翻译用量类型
pub const USAGE_TRANSLATION: &str = "translation";

/// 某服务某类用量的月度统计
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct UsageStats {
    pub id: i64,
    pub service_name: String,
    pub usage_type: String,
    /// 当月第一天
    pub usage_month: NaiveDate,
    pub characters_used: i64,
    pub requests_made: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UsageStats {
    /// 尚无记录时的零值统计
    pub fn empty(service_name: &str, usage_type: &str, usage_month: NaiveDate) -> Self {
        Self {
            id: 0,
            service_name: service_name.to_string(),
            usage_type: usage_type.to_string(),
            usage_month,
            characters_used: 0,
            requests_made: 0,
            created_at: None,
            updated_at: None,
        }
    }
}

/// 给定时间所在月份的第一天
pub fn month_start(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap();
        assert_eq!(month_start(now), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }
}
