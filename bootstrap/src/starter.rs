//! 服务启动器

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use quiz_adapter_postgres::Migration;
use quiz_config::AppConfig;
use quiz_errors::AppResult;
use quiz_telemetry::init_metrics;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::health::{HealthChecker, health_routes};
use crate::infrastructure::{Infrastructure, connect_database, run_migrations};
use crate::runtime::{init_runtime, shutdown_signal};
use crate::shutdown::ShutdownController;

/// 运行 HTTP 服务
///
/// 1. 加载配置（`.env` → 配置文件 → 环境变量）
/// 2. 初始化日志与 Prometheus
/// 3. 连接数据库并执行迁移
/// 4. 调用 `router_builder` 构建业务路由
/// 5. 挂载健康检查与通用中间件，启动服务并处理优雅关闭
///
/// ```ignore
/// quiz_bootstrap::run("config", migrations(), |infra| async move {
///     Ok(build_router(infra))
/// })
/// .await
/// ```
pub async fn run<F, Fut>(
    config_dir: &str,
    migrations: Vec<Migration>,
    router_builder: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(Infrastructure) -> Fut,
    Fut: Future<Output = AppResult<Router>>,
{
    dotenvy::dotenv().ok();

    let config = AppConfig::load(config_dir)?;
    init_runtime(&config);
    info!("Starting {} service", config.app_name);

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, /metrics disabled");
            None
        }
    };

    let pool = connect_database(&config).await?;
    if config.database.run_migrations {
        run_migrations(&pool, &migrations).await?;
    }

    let shutdown = ShutdownController::new();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let timeout = Duration::from_secs(config.server.request_timeout_secs);
    let body_limit = config.server.body_limit_bytes;

    let infra = Infrastructure::new(config, pool.clone(), shutdown.token());
    let routes = router_builder(infra).await?;

    let app = with_common_layers(
        routes.merge(health_routes(HealthChecker::new(pool.clone()), metrics)),
        timeout,
        body_limit,
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server starting");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => signal.shutdown(),
                _ = signal.wait() => {},
            }
        })
        .await?;

    // 通知后台任务退出
    shutdown.shutdown();
    pool.close().await;

    info!("Service stopped");
    Ok(())
}

/// 请求体上限、超时（408）、CORS 与访问日志
pub fn with_common_layers(router: Router, timeout: Duration, body_limit: usize) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
