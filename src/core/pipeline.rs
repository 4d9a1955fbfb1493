use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::anomaly::detector::{AnomalyDetector, AnomalyResult};
use crate::error::Result;
use crate::interfaces::price_store::PriceStore;
use crate::observability::metrics::ANOMALIES_DETECTED;
use crate::price_infra::fetcher::PriceFetcher;
use crate::price_infra::registry::SymbolRegistry;
use crate::types::price_point::PricePoint;

/// Entry point for collection and analysis. Owns no state beyond its collaborators.
pub struct PricePipeline {
    fetcher: Arc<PriceFetcher>,
    store: Arc<dyn PriceStore>,
    detector: AnomalyDetector,
}

impl PricePipeline {
    pub fn new(
        fetcher: Arc<PriceFetcher>,
        store: Arc<dyn PriceStore>,
        detector: AnomalyDetector,
    ) -> Self {
        PricePipeline {
            fetcher,
            store,
            detector,
        }
    }

    /// Fetch one price and persist it. Nothing is written unless the fetch succeeds.
    pub async fn collect_once(
        &self,
        raw_symbol: &str,
        caller_key: &str,
        cancel: &CancellationToken,
    ) -> Result<PricePoint> {
        // Step 1: Validate
        let symbol = SymbolRegistry::validate(raw_symbol)?;

        // Step 2: Fetch
        let fetched = self.fetcher.fetch(symbol, caller_key, cancel).await?;

        // Step 3: Persist
        let point = self.store.add_price_point(symbol, fetched.price).await?;

        tracing::info!(
            "Collected {} at {} (id {}, {} attempt(s))",
            symbol,
            point.price,
            point.id,
            fetched.attempts
        );
        Ok(point)
    }

    pub async fn check_anomaly(&self, raw_symbol: &str) -> Result<AnomalyResult> {
        let symbol = SymbolRegistry::validate(raw_symbol)?;
        let points = self.store.get_last_two(symbol).await?;

        let result = self.detector.evaluate(symbol, &points);
        if result.is_anomaly() {
            ANOMALIES_DETECTED.inc();
            tracing::warn!("Price anomaly detected for {}: {:?}", symbol, result);
        }

        Ok(result)
    }

    pub async fn price_history(&self, raw_symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        let symbol = SymbolRegistry::validate(raw_symbol)?;
        self.store.get_price_history(symbol, limit).await
    }

    pub fn list_supported_symbols(&self) -> BTreeMap<&'static str, &'static str> {
        SymbolRegistry::supported()
    }
}
