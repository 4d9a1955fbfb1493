use serde::{Deserialize, Serialize};
use crate::config::AnomalyConfig;
use crate::types::price::Price;
use crate::types::price_point::PricePoint;
use crate::types::symbol::Symbol;

pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// Outcome of comparing the two most recent readings of a symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalyResult {
    Compared {
        symbol: Symbol,
        anomaly: bool,
        latest_price: Price,
        previous_price: Price,
        price_difference: Price,
    },
    InsufficientData {
        symbol: Symbol,
        anomaly: bool,
        message: String,
    },
}

impl AnomalyResult {
    pub fn insufficient(symbol: Symbol) -> Self {
        AnomalyResult::InsufficientData {
            symbol,
            anomaly: false,
            message: INSUFFICIENT_DATA.to_string(),
        }
    }

    pub fn is_anomaly(&self) -> bool {
        match self {
            AnomalyResult::Compared { anomaly, .. } => *anomaly,
            AnomalyResult::InsufficientData { .. } => false,
        }
    }
}

/// Flags a symbol when consecutive readings differ by at least `threshold`.
#[derive(Clone, Copy, Debug)]
pub struct AnomalyDetector {
    threshold: Price,
}

impl AnomalyDetector {
    pub fn new(threshold: Price) -> Self {
        AnomalyDetector { threshold }
    }

    pub fn from_config(config: &AnomalyConfig) -> Self {
        Self::new(Price::from_f64(config.threshold))
    }

    /// `points` must be ordered newest first. Only the first two are read.
    pub fn evaluate(&self, symbol: Symbol, points: &[PricePoint]) -> AnomalyResult {
        let (latest, previous) = match points {
            [latest, previous, ..] => (latest.price, previous.price),
            _ => return AnomalyResult::insufficient(symbol),
        };

        let price_difference = latest.abs_diff(previous);

        AnomalyResult::Compared {
            symbol,
            anomaly: price_difference >= self.threshold,
            latest_price: latest,
            previous_price: previous,
            price_difference,
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&AnomalyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::types::ids::PricePointId;

    fn points(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint {
                id: PricePointId(100 - i as u64),
                symbol: Symbol::Btc,
                price: Price::from_f64(*p),
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn large_jump_is_anomalous() {
        let result = AnomalyDetector::default().evaluate(Symbol::Btc, &points(&[51500.0, 50000.0]));

        assert_eq!(result, AnomalyResult::Compared {
            symbol: Symbol::Btc,
            anomaly: true,
            latest_price: Price::from_f64(51500.0),
            previous_price: Price::from_f64(50000.0),
            price_difference: Price::from_f64(1500.0),
        });
    }

    #[test]
    fn small_move_is_not_anomalous() {
        let result = AnomalyDetector::default().evaluate(Symbol::Btc, &points(&[50050.0, 50000.0]));

        match result {
            AnomalyResult::Compared { anomaly, price_difference, .. } => {
                assert!(!anomaly);
                assert_eq!(price_difference, Price::from_f64(50.0));
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn drop_counts_like_a_rise() {
        let result = AnomalyDetector::default().evaluate(Symbol::Btc, &points(&[49800.0, 50000.0]));
        assert!(result.is_anomaly());
    }

    #[test]
    fn difference_equal_to_threshold_is_anomalous() {
        let result = AnomalyDetector::default().evaluate(Symbol::Btc, &points(&[50100.0, 50000.0]));
        assert!(result.is_anomaly());

        let result = AnomalyDetector::default().evaluate(Symbol::Btc, &points(&[50099.99, 50000.0]));
        assert!(!result.is_anomaly());
    }

    #[test]
    fn fewer_than_two_points_is_insufficient() {
        let detector = AnomalyDetector::default();
        assert_eq!(detector.evaluate(Symbol::Eth, &[]), AnomalyResult::insufficient(Symbol::Eth));
        assert_eq!(detector.evaluate(Symbol::Eth, &points(&[3000.0])), AnomalyResult::insufficient(Symbol::Eth));
    }

    #[test]
    fn only_two_newest_points_matter() {
        let result = AnomalyDetector::default().evaluate(Symbol::Btc, &points(&[50000.0, 50010.0, 10.0]));
        assert!(!result.is_anomaly());
    }

    #[test]
    fn custom_threshold() {
        let detector = AnomalyDetector::new(Price::from_f64(5.0));
        assert!(detector.evaluate(Symbol::Ada, &points(&[1.0, 7.0])).is_anomaly());
    }

    #[test]
    fn serializes_flat_json() {
        let json = serde_json::to_value(AnomalyResult::insufficient(Symbol::Sol)).unwrap();
        assert_eq!(json, serde_json::json!({
            "symbol": "SOL",
            "anomaly": false,
            "message": "insufficient data",
        }));

        let json = serde_json::to_value(
            AnomalyDetector::default().evaluate(Symbol::Btc, &points(&[51500.0, 50000.0]))
        ).unwrap();
        assert_eq!(json["anomaly"], true);
        assert_eq!(json["price_difference"], 1500.0);
        assert_eq!(json["previous_price"], 50000.0);
    }
}
