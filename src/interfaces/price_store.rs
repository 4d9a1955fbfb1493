use async_trait::async_trait;
use crate::error::Result;
use crate::types::price::Price;
use crate::types::price_point::PricePoint;
use crate::types::symbol::Symbol;

/// Persistence of collected price points. Reads return newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Persist a reading, assigning its id and timestamp.
    async fn add_price_point(&self, symbol: Symbol, price: Price) -> Result<PricePoint>;

    /// Up to two most recent points.
    async fn get_last_two(&self, symbol: Symbol) -> Result<Vec<PricePoint>>;

    async fn get_price_history(&self, symbol: Symbol, limit: usize) -> Result<Vec<PricePoint>>;
}
