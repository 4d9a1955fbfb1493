use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use market_pipeline::api::rest::{create_router, AppState};
use market_pipeline::app::{persist_store, restore_store, spawn_background_tasks, Components};
use market_pipeline::config::AppConfig;
use market_pipeline::observability::metrics::register_metrics;
use market_pipeline::observability::tracing::init_tracing;
use market_pipeline::price_infra::connectors::coingecko::CoinGeckoSource;
use market_pipeline::storage::snapshot_manager::SnapshotManager;
use market_pipeline::utils::task_supervisor::TaskSupervisor;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("failed to load configuration")?;

    let _log_guard = init_tracing(&config.logging).context("failed to initialise logging")?;
    register_metrics();
    tracing::info!("Starting market pipeline ({})", env);

    // Step 1: Components
    let source = CoinGeckoSource::from_config(&config.upstream)
        .context("failed to build upstream client")?;
    let components = Components::build(&config, Arc::new(source));

    // Step 2: Restore state
    let snapshots = Arc::new(SnapshotManager::from_config(&config.storage));
    restore_store(&components.store, &snapshots)
        .await
        .context("failed to restore price store")?;

    // Step 3: Background tasks
    let shutdown = CancellationToken::new();
    let mut supervisor = TaskSupervisor::new(shutdown.clone());
    spawn_background_tasks(&mut supervisor, &config, &components, snapshots.clone());

    // Step 4: HTTP server
    let state = Arc::new(AppState {
        pipeline: components.pipeline.clone(),
        request_deadline: config.server.request_deadline(),
        shutdown: shutdown.clone(),
    });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!("Listening on {}", config.server.bind_addr);

    let signal_token = shutdown.clone();
    let serve = async {
        let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutdown requested");
                signal_token.cancel();
            })
            .await;
        // Stops the health monitor if the server exits on its own
        shutdown.cancel();
        result
    };

    let (served, _) = tokio::join!(serve, supervisor.monitor(HEALTH_CHECK_INTERVAL));
    served.context("server error")?;

    // Step 5: Drain and persist
    supervisor.shutdown_all().await;
    persist_store(&components.store, &snapshots)
        .await
        .context("failed to write final snapshot")?;

    tracing::info!("Market pipeline stopped");
    Ok(())
}
