use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use tracing::Instrument;
use crate::observability::tracing::trace_request;
use crate::types::ids::RequestId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Identity the rate limiter buckets a request under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerKey(pub String);

impl CallerKey {
    /// API key header, else peer IP, else anonymous.
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let api_key = headers
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty());

        if let Some(key) = api_key {
            return CallerKey(key.to_string());
        }

        match peer {
            Some(addr) => CallerKey(addr.ip().to_string()),
            None => CallerKey(ANONYMOUS_CALLER.to_string()),
        }
    }
}

/// Attach a request id and caller key, run the handler inside a request span,
/// and echo the id back in `x-request-id`.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    // Reuse a well-formed inbound id so traces can be joined across services
    let request_id = request.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| RequestId::from_string(s).ok())
        .unwrap_or_default();

    let peer = request.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let caller = CallerKey::resolve(request.headers(), peer);

    let span = trace_request(&request_id, request.method().as_str(), request.uri().path());

    request.extensions_mut().insert(request_id);
    request.extensions_mut().insert(caller);

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
