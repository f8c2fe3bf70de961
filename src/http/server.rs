//! HTTP server implementation.

use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::handlers::{self, AppState};
use crate::error::Result;
use crate::ratelimit::{Clock, FixedWindowLimiter, SystemClock};

/// Build the decision service routes around a shared limiter.
pub fn router<C: Clock + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/v1/check",
            get(handlers::check_caller::<C>).post(handlers::check_key::<C>),
        )
        .with_state(state)
}

/// HTTP server exposing rate limit decisions.
pub struct HttpServer<C: Clock + 'static = SystemClock> {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<FixedWindowLimiter<C>>,
    /// Reverse proxies trusted to append to `X-Forwarded-For`
    trusted_proxy_hops: usize,
}

impl<C: Clock + 'static> HttpServer<C> {
    /// Create a new HTTP server around a limiter.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<FixedWindowLimiter<C>>) -> Self {
        Self {
            addr,
            rate_limiter,
            trusted_proxy_hops: 0,
        }
    }

    /// Trust the last `hops` entries of `X-Forwarded-For` when keying
    /// `GET /v1/check` callers.
    pub fn with_trusted_proxy_hops(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;

        self.serve_listener(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    pub async fn serve_listener<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        info!(
            addr = %listener.local_addr()?,
            "Starting HTTP server with graceful shutdown"
        );

        let app = router(AppState {
            limiter: self.rate_limiter,
            trusted_proxy_hops: self.trusted_proxy_hops,
        });
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{LimitConfig, MockClock};
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let rate_limiter = Arc::new(FixedWindowLimiter::new());
        let _server = HttpServer::new(addr, rate_limiter).with_trusted_proxy_hops(1);
    }

    /// Serve a mock-clocked limiter on an ephemeral port.
    async fn spawn_server(
        trusted_proxy_hops: usize,
    ) -> (String, MockClock, oneshot::Sender<()>) {
        let clock = MockClock::new(Instant::now());
        let limiter = Arc::new(FixedWindowLimiter::with_clock(
            LimitConfig::default(),
            clock.clone(),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = HttpServer::new(addr, limiter).with_trusted_proxy_hops(trusted_proxy_hops);
        tokio::spawn(async move {
            server
                .serve_listener(listener, async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        (format!("http://{}/v1/check", addr), clock, tx)
    }

    fn retry_after(response: &reqwest::Response) -> u64 {
        response.headers()["retry-after"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_caller_check_denies_peer_and_recovers_after_window() {
        let (url, clock, shutdown) = spawn_server(0).await;
        let client = reqwest::Client::new();

        for _ in 0..5 {
            let response = client.get(&url).send().await.unwrap();
            assert_eq!(response.status(), 200);
        }

        clock.advance(Duration::from_secs(20));
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), 429);
        assert_eq!(retry_after(&response), 40);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "allowed": false, "retryAfterSeconds": 40 }));

        clock.advance(Duration::from_millis(41_000));
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "allowed": true }));

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn test_explicit_key_recovers_after_window() {
        let (url, clock, shutdown) = spawn_server(0).await;
        let client = reqwest::Client::new();

        for _ in 0..5 {
            client
                .post(&url)
                .json(&json!({ "key": "ip-1" }))
                .send()
                .await
                .unwrap();
        }
        let response = client
            .post(&url)
            .json(&json!({ "key": "ip-1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 429);
        assert_eq!(retry_after(&response), 60);

        clock.advance(Duration::from_millis(61_000));
        let response = client
            .post(&url)
            .json(&json!({ "key": "ip-1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let _ = shutdown.send(());
    }
}
