use tracing::Span;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::types::ids::RequestId;
use crate::types::symbol::Symbol;

/// Install the global subscriber: stdout plus an optional daily-rotated file.
/// `RUST_LOG` wins over the configured filter.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. Safe to call more than once; later calls leave
/// the first subscriber in place.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_writer, guard) = match file_writer(config)? {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    let stdout_layer = if config.json {
        fmt::layer().json().with_current_span(true).with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
    });

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = result {
        tracing::debug!("Tracing subscriber already installed: {}", e);
    }

    Ok(guard)
}

/// Non-blocking writer over `<file_dir>/<file_prefix>.<date>.log`, or `None`
/// when file logging is off.
pub fn file_writer(config: &LoggingConfig) -> Result<Option<(NonBlocking, WorkerGuard)>> {
    if !config.file_enabled {
        return Ok(None);
    }

    std::fs::create_dir_all(&config.file_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&config.file_dir)
        .map_err(|e| Error::ConfigError(format!("logging.file_dir {}: {}", config.file_dir, e)))?;

    Ok(Some(tracing_appender::non_blocking(appender)))
}

pub fn trace_fetch(symbol: Symbol, caller: &str) -> Span {
    tracing::info_span!(
        "price_fetch",
        symbol = %symbol,
        caller = caller,
    )
}

pub fn trace_request(request_id: &RequestId, method: &str, path: &str) -> Span {
    tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = method,
        path = path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_config(dir: &std::path::Path) -> LoggingConfig {
        LoggingConfig {
            file_dir: dir.to_string_lossy().into_owned(),
            file_prefix: "pipeline-test".to_string(),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn disabled_file_logging_has_no_writer() {
        let config = LoggingConfig {
            file_enabled: false,
            ..LoggingConfig::default()
        };
        assert!(file_writer(&config).unwrap().is_none());
    }

    #[test]
    fn file_writer_flushes_on_guard_drop() {
        let dir = std::env::temp_dir().join(format!("market-pipeline-logs-{}", uuid::Uuid::new_v4()));
        let config = file_config(&dir);

        let (mut writer, guard) = file_writer(&config).unwrap().unwrap();
        writer.write_all(b"{\"message\":\"collected BTC\"}\n").unwrap();
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);

        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pipeline-test"));
        assert!(name.ends_with(".log"));

        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("collected BTC"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn init_tracing_returns_file_guard() {
        let dir = std::env::temp_dir().join(format!("market-pipeline-logs-{}", uuid::Uuid::new_v4()));
        let guard = init_tracing(&file_config(&dir)).unwrap();
        assert!(guard.is_some());
        drop(guard);
        std::fs::remove_dir_all(&dir).ok();
    }
}
