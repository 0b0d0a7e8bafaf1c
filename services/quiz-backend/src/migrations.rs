//! 内嵌的数据库迁移脚本

use quiz_adapter_postgres::Migration;

/// 按版本排列的全部迁移
pub fn all() -> Vec<Migration> {
    vec![
        Migration::new(1, "users", include_str!("../migrations/001_users.sql")),
        Migration::new(
            2,
            "auth_api_keys",
            include_str!("../migrations/002_auth_api_keys.sql"),
        ),
        Migration::new(
            3,
            "feedback_reports",
            include_str!("../migrations/003_feedback_reports.sql"),
        ),
        Migration::new(4, "usage_stats", include_str!("../migrations/004_usage_stats.sql")),
        Migration::new(
            5,
            "translation_cache",
            include_str!("../migrations/005_translation_cache.sql"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_unique_and_ordered() {
        let migrations = all();
        let versions: Vec<i64> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
        assert!(migrations.iter().all(|m| !m.sql.trim().is_empty()));
    }
}
