use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::observability::metrics::{FETCH_ATTEMPTS, FETCH_RETRIES, RATE_LIMITED, UPSTREAM_LATENCY};
use crate::observability::tracing::trace_fetch;
use crate::price_infra::backoff::BackoffPolicy;
use crate::price_infra::connectors::{PriceSource, TransportError, UpstreamResponse};
use crate::price_infra::rate_limiter::RateLimiter;
use crate::types::price::Price;
use crate::types::symbol::Symbol;

/// HTTP statuses worth retrying: throttling and transient server failures.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Transient failure that may succeed on a later attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryableFailure {
    Timeout,
    Network(String),
    Status(u16),
}

impl RetryableFailure {
    /// Terminal error once the retry budget is spent.
    pub fn exhausted(self, symbol: Symbol, attempts: u32) -> Error {
        match self {
            RetryableFailure::Timeout => Error::Timeout { symbol, attempts },
            RetryableFailure::Network(message) => Error::NetworkError { symbol, attempts, message },
            RetryableFailure::Status(status) => Error::UpstreamStatus { symbol, status, attempts },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RetryableFailure::Timeout => "timeout",
            RetryableFailure::Network(_) => "network_error",
            RetryableFailure::Status(_) => "retryable_status",
        }
    }
}

/// Result of a single request attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Price),
    Retryable(RetryableFailure),
    Fatal(Error),
}

impl AttemptOutcome {
    fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::Retryable(failure) => failure.label(),
            AttemptOutcome::Fatal(e) => e.kind(),
        }
    }
}

/// A price obtained from the upstream, with the number of attempts it took.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedPrice {
    pub symbol: Symbol,
    pub price: Price,
    pub attempts: u32,
}

/// Classify the outcome of one upstream request.
pub fn classify(
    symbol: Symbol,
    vs_currency: &str,
    result: std::result::Result<UpstreamResponse, TransportError>,
) -> AttemptOutcome {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::Timeout(_)) => return AttemptOutcome::Retryable(RetryableFailure::Timeout),
        Err(TransportError::Network(msg)) => return AttemptOutcome::Retryable(RetryableFailure::Network(msg)),
    };

    if !response.is_success() {
        if RETRYABLE_STATUSES.contains(&response.status) {
            return AttemptOutcome::Retryable(RetryableFailure::Status(response.status));
        }
        return AttemptOutcome::Fatal(Error::UpstreamStatus {
            symbol,
            status: response.status,
            attempts: 1,
        });
    }

    match parse_price(&response.body, symbol.upstream_id(), vs_currency) {
        Ok(price) => AttemptOutcome::Success(price),
        Err(reason) => AttemptOutcome::Fatal(Error::NoData { symbol, reason }),
    }
}

/// Extract `body[upstream_id][vs_currency]` as a positive price.
fn parse_price(body: &[u8], upstream_id: &str, vs_currency: &str) -> std::result::Result<Price, String> {
    let parsed: HashMap<String, HashMap<String, serde_json::Value>> = serde_json::from_slice(body)
        .map_err(|e| format!("unexpected payload shape: {}", e))?;

    let quote = parsed.get(upstream_id)
        .ok_or_else(|| format!("id {} missing from response", upstream_id))?;

    let value = quote.get(vs_currency)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| format!("no {} quote for {}", vs_currency, upstream_id))?;

    Price::try_positive(value)
        .ok_or_else(|| format!("invalid price {} for {}", value, upstream_id))
}

/// Rate-limited, retrying price fetcher.
///
/// Each attempt runs `RateCheck -> Requesting -> {Success | Retryable | Fatal}`.
/// Retryable outcomes sleep for the backoff delay and start over from the
/// rate check, so retries draw from the caller's admission budget too.
/// At most `max_retries + 1` requests are sent.
pub struct PriceFetcher {
    source: Arc<dyn PriceSource>,
    limiter: Arc<RateLimiter>,
    backoff: BackoffPolicy,
    max_retries: u32,
    request_timeout: Duration,
}

impl PriceFetcher {
    pub fn new(
        source: Arc<dyn PriceSource>,
        limiter: Arc<RateLimiter>,
        backoff: BackoffPolicy,
        max_retries: u32,
        request_timeout: Duration,
    ) -> Self {
        PriceFetcher {
            source,
            limiter,
            backoff,
            max_retries,
            request_timeout,
        }
    }

    pub fn from_config(
        source: Arc<dyn PriceSource>,
        limiter: Arc<RateLimiter>,
        backoff: BackoffPolicy,
        config: &UpstreamConfig,
    ) -> Self {
        Self::new(source, limiter, backoff, config.max_retries, config.request_timeout())
    }

    pub async fn fetch(
        &self,
        symbol: Symbol,
        caller_key: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedPrice> {
        self.fetch_inner(symbol, caller_key, cancel)
            .instrument(trace_fetch(symbol, caller_key))
            .await
    }

    async fn fetch_inner(
        &self,
        symbol: Symbol,
        caller_key: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedPrice> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { symbol, attempts: attempt });
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(attempt, "Fetch cancelled while requesting");
                    return Err(Error::Cancelled { symbol, attempts: attempt + 1 });
                }
                outcome = self.attempt(symbol, caller_key) => outcome,
            };
            let elapsed = started.elapsed();

            FETCH_ATTEMPTS.with_label_values(&[outcome.label()]).inc();
            tracing::debug!(
                attempt,
                duration_ms = elapsed.as_millis() as u64,
                classification = outcome.label(),
                "Fetch attempt finished"
            );

            let failure = match outcome {
                AttemptOutcome::Success(price) => {
                    tracing::info!(attempt, price = %price, "Fetched price");
                    return Ok(FetchedPrice {
                        symbol,
                        price,
                        attempts: attempt + 1,
                    });
                }
                AttemptOutcome::Fatal(e) => {
                    tracing::warn!(attempt, error = %e, "Fetch failed");
                    return Err(with_attempts(e, attempt + 1));
                }
                AttemptOutcome::Retryable(failure) => failure,
            };

            if attempt >= self.max_retries {
                let e = failure.exhausted(symbol, attempt + 1);
                tracing::warn!(attempt, error = %e, "Retries exhausted");
                return Err(e);
            }

            let delay = self.backoff.delay(attempt);
            FETCH_RETRIES.inc();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                classification = failure.label(),
                "Retrying after backoff"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(attempt, "Fetch cancelled during backoff");
                    return Err(Error::Cancelled { symbol, attempts: attempt + 1 });
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// One pass through rate check, request and classification.
    pub async fn attempt(&self, symbol: Symbol, caller_key: &str) -> AttemptOutcome {
        // Step 1: Rate check
        if !self.limiter.allow(caller_key) {
            RATE_LIMITED.inc();
            return AttemptOutcome::Fatal(Error::RateLimited {
                key: caller_key.to_string(),
            });
        }

        // Step 2: Request with a bounded wait
        let timer = UPSTREAM_LATENCY.start_timer();
        let result = match tokio::time::timeout(
            self.request_timeout,
            self.source.request(symbol.upstream_id()),
        ).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "no response within {}ms",
                self.request_timeout.as_millis()
            ))),
        };
        timer.observe_duration();

        // Step 3: Classify
        classify(symbol, self.source.vs_currency(), result)
    }
}

fn with_attempts(e: Error, attempts: u32) -> Error {
    match e {
        Error::UpstreamStatus { symbol, status, .. } => Error::UpstreamStatus { symbol, status, attempts },
        other => other,
    }
}
