pub mod detector;

pub use detector::{AnomalyDetector, AnomalyResult};
