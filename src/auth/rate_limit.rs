use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::AppState;

/// Login and registration attempts per client and path.
const AUTH_MAX_REQUESTS: u32 = 5;
const AUTH_WINDOW_SECS: u64 = 60;

const CLEANUP_INTERVAL_SECS: u64 = 300;

/// Fixed-window counters held in process memory. Single-instance only.
#[derive(Clone, Default)]
pub struct RateLimitState {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request against `key`. Returns the remaining allowance, or
    /// how long until the window resets when the key is over its limit.
    pub async fn check(&self, key: &str, max_requests: u32, window_secs: u64) -> Result<u32, Duration> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
            window,
        });

        if now.duration_since(entry.window_start) >= entry.window {
            entry.count = 0;
            entry.window_start = now;
            entry.window = window;
        }

        if entry.count >= max_requests {
            let retry_after = entry.window.saturating_sub(now.duration_since(entry.window_start));
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(max_requests - entry.count)
    }

    /// Drop counters whose window has closed.
    pub async fn cleanup(&self) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < entry.window);
    }

    #[cfg(test)]
    pub async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                limiter.cleanup().await;
            }
        })
    }
}

async fn enforce(
    state: &AppState,
    key: String,
    max_requests: u32,
    window_secs: u64,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.rate_limiter.check(&key, max_requests, window_secs).await {
        Ok(remaining) => {
            tracing::debug!(key = %key, remaining = remaining, "Rate limit check passed");
            Ok(next.run(req).await)
        }
        Err(retry_after) => {
            tracing::warn!(
                key = %key,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            Err(AppError::RateLimited)
        }
    }
}

/// Limiter for every `/api` route, configured by
/// `RATE_LIMIT_WINDOW_SECS` and `RATE_LIMIT_MAX_REQUESTS`.
pub async fn rate_limit_api(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !req.uri().path().starts_with("/api") {
        return Ok(next.run(req).await);
    }
    let key = format!("api:{}", addr.ip());
    let (max, window) = (
        state.config.rate_limit_max_requests,
        state.config.rate_limit_window_secs,
    );
    enforce(&state, key, max, window, req, next).await
}

/// Stricter limiter for login and registration. Keyed by IP and path so the
/// two endpoints have separate allowances.
pub async fn rate_limit_auth(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("auth:{}:{}", addr.ip(), req.uri().path());
    enforce(&state, key, AUTH_MAX_REQUESTS, AUTH_WINDOW_SECS, req, next).await
}
