use futures::future::join_all;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use crate::config::CollectorConfig;
use crate::core::pipeline::PricePipeline;
use crate::error::Result;
use crate::types::price_point::PricePoint;

/// Periodically collects every configured symbol until `shutdown` fires.
pub struct ScheduledCollector {
    pipeline: Arc<PricePipeline>,
    config: CollectorConfig,
}

impl ScheduledCollector {
    pub fn new(pipeline: Arc<PricePipeline>, config: CollectorConfig) -> Self {
        ScheduledCollector { pipeline, config }
    }

    /// One round: all symbols concurrently, one result per symbol in config order.
    pub async fn collect_round(&self, cancel: &CancellationToken) -> Vec<Result<PricePoint>> {
        let tasks = self.config.symbols.iter().map(|symbol| {
            self.pipeline.collect_once(symbol, &self.config.caller_key, cancel)
        });

        let results = join_all(tasks).await;

        for (symbol, result) in self.config.symbols.iter().zip(&results) {
            if let Err(e) = result {
                tracing::warn!("Scheduled collection for {} failed: {}", symbol, e);
            }
        }

        results
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Scheduled collector started for {:?} every {}ms",
            self.config.symbols,
            self.config.interval_ms
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let results = self.collect_round(&shutdown).await;
                    let collected = results.iter().filter(|r| r.is_ok()).count();
                    tracing::debug!("Collection round stored {}/{} prices", collected, results.len());
                }
            }
        }

        tracing::info!("Scheduled collector stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use crate::anomaly::detector::AnomalyDetector;
    use crate::error::Error;
    use crate::interfaces::price_store::PriceStore;
    use crate::price_infra::backoff::{BackoffPolicy, NoJitter};
    use crate::price_infra::connectors::{PriceSource, TransportError, UpstreamResponse};
    use crate::price_infra::fetcher::PriceFetcher;
    use crate::price_infra::rate_limiter::RateLimiter;
    use crate::storage::memory::MemoryPriceStore;
    use crate::types::symbol::Symbol;

    /// Quotes every asset at the same price.
    struct FlatSource;

    #[async_trait]
    impl PriceSource for FlatSource {
        async fn request(&self, upstream_id: &str) -> std::result::Result<UpstreamResponse, TransportError> {
            Ok(UpstreamResponse {
                status: 200,
                body: format!(r#"{{"{}":{{"usd":42.0}}}}"#, upstream_id).into_bytes(),
            })
        }

        fn vs_currency(&self) -> &str {
            "usd"
        }

        fn source_id(&self) -> &str {
            "flat"
        }
    }

    fn collector(symbols: &[&str], store: Arc<MemoryPriceStore>) -> ScheduledCollector {
        let fetcher = PriceFetcher::new(
            Arc::new(FlatSource),
            Arc::new(RateLimiter::new(100, Duration::from_secs(60))),
            BackoffPolicy::with_jitter_source(
                Duration::from_millis(10),
                Duration::from_millis(10),
                Duration::ZERO,
                Arc::new(NoJitter),
            ),
            0,
            Duration::from_secs(5),
        );
        let pipeline = PricePipeline::new(Arc::new(fetcher), store, AnomalyDetector::default());

        ScheduledCollector::new(Arc::new(pipeline), CollectorConfig {
            enabled: true,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            interval_ms: 1_000,
            caller_key: "scheduler".to_string(),
        })
    }

    #[tokio::test]
    async fn round_collects_each_symbol() {
        let store = Arc::new(MemoryPriceStore::new());
        let collector = collector(&["BTC", "eth", "xrp"], store.clone());

        let results = collector.collect_round(&CancellationToken::new()).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(Error::UnsupportedSymbol { .. })));
        assert_eq!(store.get_last_two(Symbol::Eth).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_until_shutdown() {
        let store = Arc::new(MemoryPriceStore::new());
        let collector = collector(&["SOL"], store.clone());
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(collector.run(shutdown.clone()));

        // Ticks at 0s, 1s and 2s
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(store.get_price_history(Symbol::Sol, 10).await.unwrap().len(), 3);
    }
}
