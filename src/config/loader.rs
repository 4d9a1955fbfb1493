use crate::config::*;
use crate::error::{Error, Result};
use crate::price_infra::backoff::BackoffPolicy;
use crate::price_infra::registry::SymbolRegistry;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

/// Process configuration. Built once at startup and handed to the components
/// that need it; nothing reads configuration from global state.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub rate_limit: RateLimitConfig,
    pub backoff: BackoffConfig,
    pub anomaly: AnomalyConfig,
    pub storage: StorageConfig,
    pub collector: CollectorConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Layers `config/default`, `config/<env>` and `MARKET_PIPELINE__*` environment
    /// variables (e.g. `MARKET_PIPELINE__UPSTREAM__MAX_RETRIES=5`).
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("MARKET_PIPELINE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("collector.symbols"),
            )
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            return Err(Error::ConfigError("rate_limit.max_requests must be at least 1".into()));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(Error::ConfigError("rate_limit.window_ms must be positive".into()));
        }
        if self.rate_limit.sweep_interval_ms == 0 {
            return Err(Error::ConfigError("rate_limit.sweep_interval_ms must be positive".into()));
        }
        if self.storage.snapshot_interval_ms == 0 {
            return Err(Error::ConfigError("storage.snapshot_interval_ms must be positive".into()));
        }
        if self.upstream.request_timeout_ms == 0 {
            return Err(Error::ConfigError("upstream.request_timeout_ms must be positive".into()));
        }
        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(Error::ConfigError(format!(
                "backoff.max_delay_ms ({}) is below backoff.base_delay_ms ({})",
                self.backoff.max_delay_ms, self.backoff.base_delay_ms
            )));
        }
        let worst_case = self.worst_case_fetch();
        if self.server.request_deadline() <= worst_case {
            return Err(Error::ConfigError(format!(
                "server.request_deadline_ms ({}) must exceed the worst-case fetch time of {}ms",
                self.server.request_deadline_ms,
                worst_case.as_millis()
            )));
        }
        if !(self.anomaly.threshold.is_finite() && self.anomaly.threshold > 0.0) {
            return Err(Error::ConfigError(format!(
                "anomaly.threshold must be a positive number, got {}",
                self.anomaly.threshold
            )));
        }
        if self.collector.enabled && self.collector.interval_ms == 0 {
            return Err(Error::ConfigError("collector.interval_ms must be positive".into()));
        }
        for raw in &self.collector.symbols {
            SymbolRegistry::validate(raw)
                .map_err(|e| Error::ConfigError(format!("collector.symbols: {}", e)))?;
        }
        Ok(())
    }

    /// Longest a fetch can run when every attempt times out and every
    /// backoff draws its full jitter.
    pub fn worst_case_fetch(&self) -> Duration {
        let retries = self.upstream.max_retries;
        let backoff = BackoffPolicy::from_config(&self.backoff);

        let requests = self.upstream.request_timeout().saturating_mul(retries.saturating_add(1));

        // Delays stop growing once the cap is reached
        let mut sleeps = Duration::ZERO;
        for attempt in 0..retries.min(32) {
            sleeps = sleeps.saturating_add(backoff.capped_delay(attempt));
        }
        sleeps = sleeps.saturating_add(backoff.capped_delay(32).saturating_mul(retries.saturating_sub(32)));

        let jitter = backoff.jitter_bound().saturating_mul(retries);

        requests.saturating_add(sleeps).saturating_add(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = AppConfig::default();
        assert_eq!(config.upstream.request_timeout_ms, 5_000);
        assert_eq!(config.upstream.vs_currency, "usd");
        assert_eq!(config.anomaly.threshold, 100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [upstream]
            max_retries = 2

            [rate_limit]
            max_requests = 2
            window_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.max_retries, 2);
        assert_eq!(config.upstream.request_timeout_ms, 5_000);
        assert_eq!(config.rate_limit.max_requests, 2);
        assert_eq!(config.backoff.base_delay_ms, 500);
    }

    #[test]
    fn default_deadline_outlasts_retry_budget() {
        let config = AppConfig::default();
        // 4 x 5s requests, 0.5 + 1 + 2s backoff, 3 x 250ms jitter
        assert_eq!(config.worst_case_fetch(), Duration::from_millis(24_250));
        assert!(config.server.request_deadline() > config.worst_case_fetch());
    }

    #[test]
    fn rejects_deadline_within_retry_budget() {
        let err = AppConfig::from_toml_str("[server]\nrequest_deadline_ms = 20000\n").unwrap_err();
        assert!(err.to_string().contains("request_deadline_ms"));

        let err = AppConfig::from_toml_str(
            "[server]\nrequest_deadline_ms = 30000\n[upstream]\nmax_retries = 5\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn huge_retry_budget_does_not_overflow() {
        let mut config = AppConfig::default();
        config.upstream.max_retries = u32::MAX;
        assert!(config.worst_case_fetch() > Duration::from_secs(3600));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_sweep_interval() {
        let err = AppConfig::from_toml_str("[rate_limit]\nsweep_interval_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("sweep_interval_ms"));
    }

    #[test]
    fn rejects_zero_snapshot_interval() {
        let err = AppConfig::from_toml_str("[storage]\nsnapshot_interval_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("snapshot_interval_ms"));
    }

    #[test]
    fn rejects_zero_request_budget() {
        let err = AppConfig::from_toml_str("[rate_limit]\nmax_requests = 0\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let err = AppConfig::from_toml_str(
            "[backoff]\nbase_delay_ms = 1000\nmax_delay_ms = 10\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_delay_ms"));
    }

    #[test]
    fn rejects_unknown_collector_symbol() {
        let err = AppConfig::from_toml_str("[collector]\nsymbols = [\"BTC\", \"XRP\"]\n").unwrap_err();
        assert!(err.to_string().contains("XRP"));
    }
}
