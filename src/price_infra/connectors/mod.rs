pub mod coingecko;

use async_trait::async_trait;
use std::fmt;

/// Raw HTTP outcome from the upstream. Classification happens in the fetcher.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before a complete HTTP response was received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Network(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(msg) => write!(f, "timeout: {}", msg),
            TransportError::Network(msg) => write!(f, "network: {}", msg),
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Request the spot price document for one upstream asset id.
    async fn request(&self, upstream_id: &str) -> std::result::Result<UpstreamResponse, TransportError>;

    /// Quote currency key expected inside the response payload.
    fn vs_currency(&self) -> &str;

    fn source_id(&self) -> &str;
}
