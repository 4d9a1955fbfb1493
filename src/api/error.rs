use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use crate::error::Error;

/// Error returned by HTTP handlers, rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Domain(Error),
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Domain(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(e) => match e {
                Error::UnsupportedSymbol { .. } => StatusCode::BAD_REQUEST,
                Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                Error::Timeout { .. }
                | Error::NetworkError { .. }
                | Error::UpstreamStatus { .. } => StatusCode::SERVICE_UNAVAILABLE,
                Error::NoData { .. } => StatusCode::BAD_GATEWAY,
                Error::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn detail(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Domain(e) if e.is_upstream() => format!("External API error: {}", e),
            ApiError::Domain(_) if self.status() == StatusCode::INTERNAL_SERVER_ERROR => {
                "Internal server error".to_string()
            }
            ApiError::Domain(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Domain(e) if status.is_server_error() => {
                tracing::error!(kind = e.kind(), "Request failed: {}", e);
            }
            ApiError::Domain(e) => tracing::info!(kind = e.kind(), "Request rejected: {}", e),
            ApiError::BadRequest(msg) => tracing::info!("Bad request: {}", msg),
        }

        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::symbol::Symbol;

    #[test]
    fn maps_statuses() {
        let cases = [
            (Error::UnsupportedSymbol { symbol: "XRP".into(), supported: "BTC".into() }, 400),
            (Error::RateLimited { key: "k".into() }, 429),
            (Error::Timeout { symbol: Symbol::Btc, attempts: 4 }, 503),
            (Error::NetworkError { symbol: Symbol::Btc, attempts: 4, message: "reset".into() }, 503),
            (Error::UpstreamStatus { symbol: Symbol::Btc, status: 404, attempts: 1 }, 503),
            (Error::NoData { symbol: Symbol::Btc, reason: "empty".into() }, 502),
            (Error::Cancelled { symbol: Symbol::Btc, attempts: 1 }, 504),
            (Error::StorageError("down".into()), 500),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status().as_u16(), expected);
        }
    }

    #[test]
    fn upstream_failures_are_prefixed() {
        let err = ApiError::from(Error::UpstreamStatus { symbol: Symbol::Eth, status: 500, attempts: 4 });
        assert!(err.detail().starts_with("External API error: "));
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = ApiError::from(Error::StorageError("connection string secret".into()));
        assert_eq!(err.detail(), "Internal server error");
    }
}
