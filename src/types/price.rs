use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::fmt;

/// USD amount as fixed-point with 8 decimal places.
///
/// Serialized as a plain JSON number so API consumers see `50000.0`,
/// while comparisons against the anomaly threshold stay exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Price(i64);

impl Price {
    const MULTIPLIER: i64 = 100_000_000;  // 10^8

    /// Largest USD amount representable without overflowing the fixed-point value.
    pub const MAX_USD: f64 = (i64::MAX / Self::MULTIPLIER) as f64;

    pub fn from_i64(value: i64) -> Self {
        Price(value)
    }

    pub fn from_f64(value: f64) -> Self {
        Price((value * Self::MULTIPLIER as f64).round() as i64)
    }

    /// Accepts only finite, strictly positive amounts that fit the fixed-point range.
    pub fn try_positive(value: f64) -> Option<Self> {
        if !(value.is_finite() && value > 0.0 && value <= Self::MAX_USD) {
            return None;
        }

        // Amounts below half a unit of the last decimal round to zero
        Some(Self::from_f64(value)).filter(Price::is_positive)
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / Self::MULTIPLIER as f64
    }

    pub fn raw_value(&self) -> i64 {
        self.0
    }

    pub fn abs(&self) -> Self {
        Price(self.0.saturating_abs())
    }

    pub fn abs_diff(self, other: Price) -> Price {
        (self - other).abs()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Price {
    type Output = Price;
    fn add(self, other: Price) -> Price {
        Price(self.0.saturating_add(other.0))
    }
}

impl Sub for Price {
    type Output = Price;
    fn sub(self, other: Price) -> Price {
        Price(self.0.saturating_sub(other.0))
    }
}

impl From<Price> for f64 {
    fn from(price: Price) -> f64 {
        price.to_f64()
    }
}

impl TryFrom<f64> for Price {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() && value.abs() <= Self::MAX_USD {
            Ok(Price::from_f64(value))
        } else {
            Err(format!("price out of range: {}", value))
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_is_exact() {
        let latest = Price::from_f64(50050.0);
        let previous = Price::from_f64(50000.0);
        assert_eq!(latest.abs_diff(previous), Price::from_f64(50.0));
        assert_eq!(previous.abs_diff(latest), Price::from_f64(50.0));
    }

    #[test]
    fn rejects_non_positive_and_non_finite() {
        assert!(Price::try_positive(0.0).is_none());
        assert!(Price::try_positive(-1.5).is_none());
        assert!(Price::try_positive(f64::NAN).is_none());
        assert!(Price::try_positive(f64::INFINITY).is_none());
        assert_eq!(Price::try_positive(0.25).map(|p| p.to_f64()), Some(0.25));
    }

    #[test]
    fn rejects_amounts_that_round_to_zero() {
        assert!(Price::try_positive(4e-9).is_none());
        assert!(Price::try_positive(f64::MIN_POSITIVE).is_none());
        assert_eq!(Price::try_positive(1e-8), Some(Price::from_i64(1)));
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&Price::from_f64(3000.5)).unwrap();
        assert_eq!(json, "3000.5");
        let back: Price = serde_json::from_str("3000.5").unwrap();
        assert_eq!(back, Price::from_f64(3000.5));
    }
}
