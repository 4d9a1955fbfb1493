use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::error::Result;
use crate::interfaces::price_store::PriceStore;
use crate::observability::metrics::PRICE_POINTS_STORED;
use crate::storage::snapshot::{SnapshotPoint, StoreSnapshot};
use crate::types::ids::PricePointId;
use crate::types::price::Price;
use crate::types::price_point::PricePoint;
use crate::types::symbol::Symbol;

/// In-process price store. Points are kept per symbol, oldest first.
pub struct MemoryPriceStore {
    points: DashMap<Symbol, Vec<PricePoint>>,
    next_id: AtomicU64,
    snapshot_sequence: AtomicU64,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        MemoryPriceStore {
            points: DashMap::new(),
            next_id: AtomicU64::new(1),
            snapshot_sequence: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.points.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the whole store into a checksummed snapshot with the next sequence number.
    pub fn export_snapshot(&self) -> StoreSnapshot {
        let sequence = self.snapshot_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let mut points: Vec<SnapshotPoint> = self.points
            .iter()
            .flat_map(|entry| entry.value().iter().map(SnapshotPoint::from).collect::<Vec<_>>())
            .collect();
        points.sort_by_key(|p| p.id);

        // Read after the copy so no exported id can reach the counter
        let next_id = self.next_id.load(Ordering::SeqCst);

        StoreSnapshot::new(sequence, next_id, points)
    }

    /// Replace the store contents with a verified snapshot.
    pub fn restore(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let mut restored: Vec<PricePoint> = snapshot.points
            .iter()
            .map(SnapshotPoint::to_price_point)
            .collect::<Result<_>>()?;
        restored.sort_by_key(|p| p.id);

        let max_id = restored.last().map(|p| p.id.0).unwrap_or(0);

        self.points.clear();
        for point in restored {
            self.points.entry(point.symbol).or_default().push(point);
        }

        self.next_id.store(snapshot.next_id.max(max_id + 1), Ordering::SeqCst);
        self.snapshot_sequence.store(snapshot.sequence, Ordering::SeqCst);

        tracing::info!(
            "Restored {} price points from snapshot {}",
            snapshot.points.len(),
            snapshot.sequence
        );
        Ok(())
    }
}

impl Default for MemoryPriceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn add_price_point(&self, symbol: Symbol, price: Price) -> Result<PricePoint> {
        // Hold the symbol's entry while assigning the id so per-symbol order matches id order
        let mut entry = self.points.entry(symbol).or_default();
        let id = PricePointId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let point = PricePoint {
            id,
            symbol,
            price,
            timestamp: Utc::now(),
        };
        entry.push(point.clone());
        drop(entry);

        PRICE_POINTS_STORED.inc();
        tracing::debug!("Stored price point {} for {} at {}", id, symbol, price);
        Ok(point)
    }

    async fn get_last_two(&self, symbol: Symbol) -> Result<Vec<PricePoint>> {
        self.get_price_history(symbol, 2).await
    }

    async fn get_price_history(&self, symbol: Symbol, limit: usize) -> Result<Vec<PricePoint>> {
        Ok(self.points
            .get(&symbol)
            .map(|points| points.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
