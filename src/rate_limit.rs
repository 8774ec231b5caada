use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::Config;

/// Per-key sliding window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            max_requests: max_requests as usize,
            window,
            trust_proxy_headers: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
        .trusting_proxy_headers(config.trust_proxy_headers)
    }

    /// Keys on `X-Forwarded-For`/`X-Real-IP` instead of the socket peer. Only
    /// safe behind a reverse proxy that overwrites those headers.
    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    fn key_for(&self, req: &Request<Body>) -> String {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        client_key(req.headers(), peer, self.trust_proxy_headers)
    }

    /// Records a hit for `key` and reports whether it is within the limit.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut timestamps = self.buckets.entry(key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push(now);
        true
    }

    /// Forgets keys with no hit inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        self.buckets.retain(|_, timestamps| {
            timestamps
                .last()
                .is_some_and(|t| now.duration_since(*t) < self.window)
        });
    }
}

// Proxy headers when trusted, then the socket peer, else one shared bucket.
fn client_key(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    headers
                        .get("x-real-ip")
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                })
        })
        .flatten();

    forwarded
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "global".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = limiter.key_for(&req);

    if !limiter.check(&key) {
        tracing::warn!(client = %key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(serde_json::json!({
                "error": "rate_limited",
                "message": "Too many requests. Please try again later."
            })),
        )
            .into_response();
    }

    next.run(req).await
}
