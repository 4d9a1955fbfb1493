use thiserror::Error;
use crate::types::symbol::Symbol;

#[derive(Error, Debug)]
pub enum Error {
    // Symbol Errors
    #[error("Unsupported symbol: {symbol}. Supported symbols: {supported}")]
    UnsupportedSymbol {
        symbol: String,
        supported: String,
    },

    // Fetch Errors
    #[error("Rate limit exceeded for caller {key}")]
    RateLimited {
        key: String,
    },

    #[error("Upstream request timed out for {symbol} after {attempts} attempt(s)")]
    Timeout {
        symbol: Symbol,
        attempts: u32,
    },

    #[error("Network error fetching {symbol} after {attempts} attempt(s): {message}")]
    NetworkError {
        symbol: Symbol,
        attempts: u32,
        message: String,
    },

    #[error("Upstream returned HTTP {status} for {symbol} after {attempts} attempt(s)")]
    UpstreamStatus {
        symbol: Symbol,
        status: u16,
        attempts: u32,
    },

    #[error("No price data returned for {symbol}: {reason}")]
    NoData {
        symbol: Symbol,
        reason: String,
    },

    #[error("Fetch for {symbol} cancelled after {attempts} attempt(s)")]
    Cancelled {
        symbol: Symbol,
        attempts: u32,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // Storage Errors
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Invalid checksum")]
    InvalidChecksum,

    #[error("No snapshot found")]
    NoSnapshotFound,

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task failure: {0}")]
    TaskFailure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnsupportedSymbol { .. } => "unsupported_symbol",
            Error::RateLimited { .. } => "rate_limited",
            Error::Timeout { .. } => "timeout",
            Error::NetworkError { .. } => "network_error",
            Error::UpstreamStatus { .. } => "upstream_status",
            Error::NoData { .. } => "no_data",
            Error::Cancelled { .. } => "cancelled",
            Error::HttpClient(_) => "http_client",
            Error::StorageError(_) => "storage_error",
            Error::SerializationError(_) => "serialization_error",
            Error::DeserializationError(_) => "deserialization_error",
            Error::InvalidChecksum => "invalid_checksum",
            Error::NoSnapshotFound => "no_snapshot_found",
            Error::ConfigError(_) => "config_error",
            Error::TaskFailure(_) => "task_failure",
            Error::IoError(_) => "io_error",
        }
    }

    /// True for failures caused by the upstream price source rather than the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::NetworkError { .. } | Error::UpstreamStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
