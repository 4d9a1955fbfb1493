pub mod backoff;
pub mod connectors;
pub mod fetcher;
pub mod rate_limiter;
pub mod registry;

pub use backoff::BackoffPolicy;
pub use fetcher::{FetchedPrice, PriceFetcher};
pub use rate_limiter::RateLimiter;
pub use registry::SymbolRegistry;
