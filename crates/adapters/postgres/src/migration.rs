//! 版本化 SQL 迁移
//!
//! 已执行的迁移记录在 `_migrations` 表中，脚本内容变化时通过校验和发现

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quiz_errors::{AppError, AppResult};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{debug, info};

const MIGRATIONS_TABLE: &str = "_migrations";

/// 已应用的迁移
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
    pub checksum: String,
}

/// 迁移脚本
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub sql: String,
    pub checksum: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = checksum(&sql);
        Self {
            version,
            name: name.into(),
            sql,
            checksum,
        }
    }
}

/// SHA-256 校验和（忽略首尾空白）
fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.trim().as_bytes()))
}

/// 单个迁移的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Applied,
    Pending,
    /// 已执行的脚本被修改过
    Modified,
}

/// 迁移执行结果
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub applied: Vec<i64>,
    pub already_applied: usize,
}

impl MigrationReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// 迁移管理器
pub struct MigrationManager {
    pool: PgPool,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建迁移记录表
    async fn ensure_table(&self) -> AppResult<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create migration table: {}", e)))?;
        Ok(())
    }

    /// 查询已应用的迁移
    pub async fn applied(&self) -> AppResult<Vec<AppliedMigration>> {
        self.ensure_table().await?;
        let sql = format!(
            "SELECT version, name, applied_at, checksum FROM {MIGRATIONS_TABLE} ORDER BY version"
        );
        sqlx::query_as::<_, AppliedMigration>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to load applied migrations: {}", e)))
    }

    /// 对照已应用记录给出每个迁移的状态
    pub async fn status(&self, migrations: &[Migration]) -> AppResult<Vec<(i64, String, MigrationState)>> {
        let applied = self.applied().await?;
        Ok(classify(&applied, migrations))
    }

    /// 按版本顺序执行所有未应用的迁移
    ///
    /// 已应用的脚本校验和不一致时直接失败，不执行任何新迁移
    pub async fn migrate(&self, migrations: &[Migration]) -> AppResult<MigrationReport> {
        let applied = self.applied().await?;
        let states = classify(&applied, migrations);

        if let Some((version, name, _)) = states
            .iter()
            .find(|(_, _, state)| *state == MigrationState::Modified)
        {
            return Err(AppError::internal(format!(
                "Migration {} ({}) was modified after being applied",
                version, name
            )));
        }

        let mut report = MigrationReport::default();
        let mut ordered: Vec<&Migration> = migrations.iter().collect();
        ordered.sort_by_key(|m| m.version);

        for migration in ordered {
            let pending = states
                .iter()
                .any(|(v, _, s)| *v == migration.version && *s == MigrationState::Pending);
            if !pending {
                report.already_applied += 1;
                continue;
            }
            self.apply(migration).await?;
            report.applied.push(migration.version);
        }

        info!(
            applied = report.applied_count(),
            already_applied = report.already_applied,
            "Database migrations complete"
        );
        Ok(report)
    }

    /// 在事务内执行单个迁移并记录
    async fn apply(&self, migration: &Migration) -> AppResult<()> {
        debug!(version = migration.version, name = %migration.name, "Applying migration");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        // 脚本可能包含多条语句，不能走预编译
        sqlx::raw_sql(&migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::database(format!(
                    "Failed to apply migration {} ({}): {}",
                    migration.version, migration.name, e
                ))
            })?;

        let insert = format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, name, checksum) VALUES ($1, $2, $3)"
        );
        sqlx::query(&insert)
            .bind(migration.version)
            .bind(&migration.name)
            .bind(&migration.checksum)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to record migration: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit migration: {}", e)))?;

        info!(version = migration.version, name = %migration.name, "Migration applied");
        Ok(())
    }
}

fn classify(
    applied: &[AppliedMigration],
    migrations: &[Migration],
) -> Vec<(i64, String, MigrationState)> {
    let recorded: HashMap<i64, &str> = applied
        .iter()
        .map(|m| (m.version, m.checksum.as_str()))
        .collect();

    let mut states: Vec<_> = migrations
        .iter()
        .map(|m| {
            let state = match recorded.get(&m.version) {
                None => MigrationState::Pending,
                Some(sum) if *sum == m.checksum => MigrationState::Applied,
                Some(_) => MigrationState::Modified,
            };
            (m.version, m.name.clone(), state)
        })
        .collect();
    states.sort_by_key(|(v, _, _)| *v);
    states
}
