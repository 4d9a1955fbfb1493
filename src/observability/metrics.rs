use std::sync::Once;
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Fetch metrics
    pub static ref FETCH_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("fetch_attempts_total", "Upstream fetch attempts by outcome"),
        &["outcome"]
    ).unwrap();

    pub static ref FETCH_RETRIES: Counter = Counter::new(
        "fetch_retries_total",
        "Total number of backoff retries scheduled"
    ).unwrap();

    pub static ref RATE_LIMITED: Counter = Counter::new(
        "rate_limited_total",
        "Total number of requests denied by the rate limiter"
    ).unwrap();

    // Storage metrics
    pub static ref PRICE_POINTS_STORED: Counter = Counter::new(
        "price_points_stored_total",
        "Total number of price points persisted"
    ).unwrap();

    pub static ref ANOMALIES_DETECTED: Counter = Counter::new(
        "anomalies_detected_total",
        "Total number of anomaly checks that flagged an anomaly"
    ).unwrap();

    // Latency metrics
    pub static ref UPSTREAM_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "upstream_latency_seconds",
            "Upstream price request latency"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).unwrap();
}

static REGISTER: Once = Once::new();

pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(FETCH_ATTEMPTS.clone()),
            Box::new(FETCH_RETRIES.clone()),
            Box::new(RATE_LIMITED.clone()),
            Box::new(PRICE_POINTS_STORED.clone()),
            Box::new(ANOMALIES_DETECTED.clone()),
            Box::new(UPSTREAM_LATENCY.clone()),
        ];

        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::error!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Prometheus text exposition of everything in `REGISTRY`.
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
