pub mod anomaly;
pub mod api;
pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod interfaces;
pub mod observability;
pub mod price_infra;
pub mod storage;
pub mod types;
pub mod utils;

// Snapshot version
pub const SNAPSHOT_VERSION: u32 = 1;
