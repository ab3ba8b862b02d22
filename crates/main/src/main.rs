//! 主应用程序入口
//!
//! 加载配置、连接数据库并执行迁移，启动 Hub、会话存储（含后台清理）和 Axum 服务。

use std::sync::Arc;

use application::{
    emitter, Hub, InMemoryCacheTier, SessionSettings, SessionStore, SessionStoreDependencies,
    SystemClock,
};
use config::AppConfig;
use infrastructure::{create_pg_pool, PgSessionRepository, MIGRATOR};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, CookieSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // RUST_LOG 优先，否则使用配置中的过滤规则
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = %config.sanitize(), "configuration loaded");

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    MIGRATOR.run(&pg_pool).await?;

    let (hub, hub_task) = Hub::spawn();
    if !emitter::install_global(hub.clone()) {
        tracing::warn!("event emitter was already installed");
    }

    let sessions = SessionStore::start(
        SessionStoreDependencies {
            cache: Arc::new(InMemoryCacheTier::new()),
            durable: Arc::new(PgSessionRepository::new(pg_pool.clone())),
            clock: Arc::new(SystemClock),
        },
        SessionSettings::from_config(&config.session),
    );

    let state = AppState::new(
        hub,
        sessions.clone(),
        emitter::global(),
        CookieSettings::from_config(&config.session),
        config.hub.outbound_capacity,
    );

    let app = router(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("fanout server listening on http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.shutdown().await;
    // 全局发射器持有一个 Hub 句柄，Hub 任务随进程退出
    hub_task.abort();
    pg_pool.close().await;
    tracing::info!("fanout server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
