use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::anomaly::detector::AnomalyDetector;
use crate::config::{AppConfig, RateLimitConfig, StorageConfig};
use crate::core::collector::ScheduledCollector;
use crate::core::pipeline::PricePipeline;
use crate::error::{Error, Result};
use crate::price_infra::backoff::BackoffPolicy;
use crate::price_infra::connectors::PriceSource;
use crate::price_infra::fetcher::PriceFetcher;
use crate::price_infra::rate_limiter::RateLimiter;
use crate::storage::memory::MemoryPriceStore;
use crate::storage::snapshot_manager::SnapshotManager;
use crate::utils::task_supervisor::TaskSupervisor;

/// Long-lived components shared by the HTTP layer and background tasks.
pub struct Components {
    pub pipeline: Arc<PricePipeline>,
    pub store: Arc<MemoryPriceStore>,
    pub limiter: Arc<RateLimiter>,
}

impl Components {
    pub fn build(config: &AppConfig, source: Arc<dyn PriceSource>) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let store = Arc::new(MemoryPriceStore::new());

        let fetcher = PriceFetcher::from_config(
            source,
            limiter.clone(),
            BackoffPolicy::from_config(&config.backoff),
            &config.upstream,
        );

        let pipeline = PricePipeline::new(
            Arc::new(fetcher),
            store.clone(),
            AnomalyDetector::from_config(&config.anomaly),
        );

        Components {
            pipeline: Arc::new(pipeline),
            store,
            limiter,
        }
    }
}

/// Load the newest usable snapshot into `store`. A missing snapshot is not an error.
pub async fn restore_store(store: &MemoryPriceStore, snapshots: &SnapshotManager) -> Result<()> {
    match snapshots.load_latest().await {
        Ok(snapshot) => store.restore(&snapshot),
        Err(Error::NoSnapshotFound) => {
            tracing::info!("No snapshot found, starting with an empty store");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn persist_store(store: &MemoryPriceStore, snapshots: &SnapshotManager) -> Result<()> {
    snapshots.save_snapshot(&store.export_snapshot()).await.map(|_| ())
}

pub fn spawn_background_tasks(
    supervisor: &mut TaskSupervisor,
    config: &AppConfig,
    components: &Components,
    snapshots: Arc<SnapshotManager>,
) {
    if config.collector.enabled {
        let collector = ScheduledCollector::new(components.pipeline.clone(), config.collector.clone());
        supervisor.spawn("scheduled_collector", move |shutdown| collector.run(shutdown));
    }

    let limiter = components.limiter.clone();
    let rate_limit = config.rate_limit.clone();
    supervisor.spawn("rate_limit_sweeper", move |shutdown| {
        sweep_rate_limiter(limiter, rate_limit, shutdown)
    });

    let store = components.store.clone();
    let storage = config.storage.clone();
    supervisor.spawn("snapshotter", move |shutdown| {
        snapshot_periodically(store, snapshots, storage, shutdown)
    });
}

async fn sweep_rate_limiter(
    limiter: Arc<RateLimiter>,
    config: RateLimitConfig,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.sweep_interval());
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = limiter.evict_expired();
                if evicted > 0 {
                    tracing::debug!("Evicted {} idle rate limit buckets", evicted);
                }
            }
        }
    }
}

async fn snapshot_periodically(
    store: Arc<MemoryPriceStore>,
    snapshots: Arc<SnapshotManager>,
    config: StorageConfig,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.snapshot_interval());
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = persist_store(&store, &snapshots).await {
                    tracing::error!("Periodic snapshot failed: {}", e);
                }
            }
        }
    }
}
