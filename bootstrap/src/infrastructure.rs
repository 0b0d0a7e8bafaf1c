//! 基础设施资源管理

use std::sync::Arc;

use quiz_adapter_postgres::{
    Migration, MigrationManager, MigrationReport, PostgresConfig, create_pool_with_retry,
};
use quiz_auth_core::TokenService;
use quiz_common::Backoff;
use quiz_config::AppConfig;
use quiz_errors::AppResult;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 服务共享的基础设施资源
#[derive(Clone)]
pub struct Infrastructure {
    config: Arc<AppConfig>,
    pool: PgPool,
    token_service: Arc<TokenService>,
    shutdown: CancellationToken,
}

impl Infrastructure {
    /// 从配置创建（数据库连接带重试）
    pub async fn from_config(config: AppConfig, shutdown: CancellationToken) -> AppResult<Self> {
        let pool = connect_database(&config).await?;
        Ok(Self::new(config, pool, shutdown))
    }

    pub fn new(config: AppConfig, pool: PgPool, shutdown: CancellationToken) -> Self {
        let token_service = TokenService::new(
            config.jwt.secret.expose_secret(),
            config.jwt.expires_in as i64,
            config.jwt.refresh_expires_in as i64,
            config.jwt.issuer.clone(),
            config.jwt.audience.clone(),
        );

        Self {
            config: Arc::new(config),
            pool,
            token_service: Arc::new(token_service),
            shutdown,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_arc(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    pub fn postgres_pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn token_service(&self) -> Arc<TokenService> {
        self.token_service.clone()
    }

    /// 后台任务的取消信号
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// 按配置创建数据库连接池
pub async fn connect_database(config: &AppConfig) -> AppResult<PgPool> {
    let pg_config = PostgresConfig::new(config.database.url.expose_secret())
        .with_max_connections(config.database.max_connections);
    create_pool_with_retry(&pg_config, &Backoff::default()).await
}

/// 执行迁移
pub async fn run_migrations(pool: &PgPool, migrations: &[Migration]) -> AppResult<MigrationReport> {
    let report = MigrationManager::new(pool.clone()).migrate(migrations).await?;
    if report.applied_count() > 0 {
        info!(versions = ?report.applied, "Applied new migrations");
    }
    Ok(report)
}
