use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::error::{Error, Result};
use crate::types::ids::PricePointId;
use crate::types::price::Price;
use crate::types::price_point::PricePoint;
use crate::types::symbol::Symbol;

/// Price point in its on-disk form. Raw fixed-point and epoch millis keep it lossless.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPoint {
    pub id: u64,
    pub symbol: Symbol,
    pub price_raw: i64,
    pub timestamp_ms: i64,
}

impl From<&PricePoint> for SnapshotPoint {
    fn from(point: &PricePoint) -> Self {
        SnapshotPoint {
            id: point.id.0,
            symbol: point.symbol,
            price_raw: point.price.raw_value(),
            timestamp_ms: point.timestamp.timestamp_millis(),
        }
    }
}

impl SnapshotPoint {
    pub fn to_price_point(&self) -> Result<PricePoint> {
        let timestamp = Utc.timestamp_millis_opt(self.timestamp_ms)
            .single()
            .ok_or_else(|| Error::DeserializationError(format!(
                "invalid timestamp {} on point {}",
                self.timestamp_ms, self.id
            )))?;

        Ok(PricePoint {
            id: PricePointId(self.id),
            symbol: self.symbol,
            price: Price::from_i64(self.price_raw),
            timestamp,
        })
    }
}

/// Full copy of a price store at one moment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub next_id: u64,
    pub points: Vec<SnapshotPoint>,
    pub checksum: String,
}

impl StoreSnapshot {
    pub fn new(sequence: u64, next_id: u64, points: Vec<SnapshotPoint>) -> Self {
        let mut snapshot = StoreSnapshot {
            version: crate::SNAPSHOT_VERSION,
            sequence,
            taken_at: Utc::now(),
            next_id,
            points,
            checksum: String::new(),
        };

        snapshot.checksum = snapshot.calculate_checksum();
        snapshot
    }

    fn calculate_checksum(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(self.version.to_le_bytes());
        hasher.update(self.sequence.to_le_bytes());
        hasher.update(self.taken_at.timestamp_millis().to_le_bytes());
        hasher.update(self.next_id.to_le_bytes());

        for point in &self.points {
            hasher.update(point.id.to_le_bytes());
            hasher.update(point.symbol.as_str().as_bytes());
            hasher.update(point.price_raw.to_le_bytes());
            hasher.update(point.timestamp_ms.to_le_bytes());
        }

        hex::encode(hasher.finalize())
    }

    pub fn verify_checksum(&self) -> bool {
        self.calculate_checksum() == self.checksum
    }
}
