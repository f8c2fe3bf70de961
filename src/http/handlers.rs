//! Request handlers for the decision endpoints.

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ratelimit::{Clock, Decision, FixedWindowLimiter};

/// Header consulted for the caller address when running behind a proxy.
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared state for the decision handlers.
pub struct AppState<C: Clock> {
    pub limiter: Arc<FixedWindowLimiter<C>>,
    /// Number of reverse proxies in front of the service that append to
    /// `X-Forwarded-For`. 0 keys callers by peer IP only.
    pub trusted_proxy_hops: usize,
}

impl<C: Clock> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            trusted_proxy_hops: self.trusted_proxy_hops,
        }
    }
}

/// Body of `POST /v1/check`.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub key: String,
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Check the limit for an explicit key.
pub async fn check_key<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    Json(request): Json<CheckRequest>,
) -> Response {
    let key = request.key.trim();
    if key.is_empty() {
        warn!("Received rate limit check with empty key");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "key is required" })),
        )
            .into_response();
    }

    decision_response(key, state.limiter.check(key))
}

/// Check the limit for the calling client.
pub async fn check_caller<C: Clock + 'static>(
    State(state): State<AppState<C>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let key = client_key(&headers, peer, state.trusted_proxy_hops);
    decision_response(&key, state.limiter.check(&key))
}

/// Caller identity.
///
/// Each trusted proxy appends the address it received the request from, so
/// only the last `trusted_hops` entries of `X-Forwarded-For` are trustworthy
/// and the client is the entry written by the outermost one. Anything to the
/// left of it is client supplied. With no trusted hops, or a header shorter
/// than the proxy chain, the peer IP is used.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr, trusted_hops: usize) -> String {
    if trusted_hops == 0 {
        return peer.ip().to_string();
    }

    let hops: Vec<&str> = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .collect();

    hops.len()
        .checked_sub(trusted_hops)
        .map(|index| hops[index])
        .filter(|hop| !hop.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Map a decision to 200, or to 429 with `Retry-After`.
pub fn decision_response(key: &str, decision: Decision) -> Response {
    match decision {
        Decision::Allowed => {
            debug!(key = %key, "Request allowed");
            (StatusCode::OK, Json(decision)).into_response()
        }
        Decision::Denied {
            retry_after_seconds,
        } => {
            info!(key = %key, retry_after_seconds, "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds))],
                Json(decision),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "203.0.113.7:51000".parse().unwrap()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_client_key_uses_peer_ip() {
        assert_eq!(client_key(&HeaderMap::new(), peer(), 0), "203.0.113.7");
        assert_eq!(client_key(&HeaderMap::new(), peer(), 1), "203.0.113.7");
    }

    #[test]
    fn test_client_key_ignores_forwarded_header_without_trusted_proxies() {
        let headers = forwarded("198.51.100.1");
        assert_eq!(client_key(&headers, peer(), 0), "203.0.113.7");
    }

    #[test]
    fn test_client_key_uses_entry_added_by_trusted_proxy() {
        let headers = forwarded(" 10.9.9.1 , 198.51.100.1");
        assert_eq!(client_key(&headers, peer(), 1), "198.51.100.1");
    }

    #[test]
    fn test_client_key_spoofed_leading_entries_do_not_change_key() {
        let first = forwarded("10.9.9.1, 198.51.100.1");
        let second = forwarded("10.9.9.2, 10.9.9.3, 198.51.100.1");

        assert_eq!(client_key(&first, peer(), 1), client_key(&second, peer(), 1));
    }

    #[test]
    fn test_client_key_with_two_trusted_proxies() {
        let headers = forwarded("10.9.9.1, 198.51.100.1, 10.0.0.2");
        assert_eq!(client_key(&headers, peer(), 2), "198.51.100.1");
    }

    #[test]
    fn test_client_key_combines_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append(FORWARDED_FOR, HeaderValue::from_static("10.9.9.1"));
        headers.append(FORWARDED_FOR, HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_key(&headers, peer(), 1), "198.51.100.1");
    }

    #[test]
    fn test_client_key_falls_back_when_header_is_short_or_blank() {
        assert_eq!(client_key(&forwarded("198.51.100.1"), peer(), 2), "203.0.113.7");
        assert_eq!(client_key(&forwarded(" "), peer(), 1), "203.0.113.7");
    }

    #[test]
    fn test_denied_response_sets_retry_after() {
        let response = decision_response(
            "ip-1",
            Decision::Denied {
                retry_after_seconds: 17,
            },
        );

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "17");
    }

    #[test]
    fn test_allowed_response() {
        let response = decision_response("ip-1", Decision::Allowed);

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
