use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::types::ids::PricePointId;
use crate::types::price::Price;
use crate::types::symbol::Symbol;

/// A persisted spot price reading. Created only by storage after a successful fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub id: PricePointId,
    pub symbol: Symbol,
    pub price: Price,
    pub timestamp: DateTime<Utc>,
}
