//! Fixed-window, in-process rate limiting keyed by client IP and path.
//!
//! Counters live in process memory: they are not shared between server
//! instances and reset on restart.

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Mutex,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use log::{info, warn};
use serde_json::json;

use crate::state::AppState;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sensitivity tiers with their limit, window and rejection message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    Strict,
    Moderate,
    Lenient,
    VeryStrict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window: Duration,
    pub message: &'static str,
}

impl RateLimitTier {
    pub fn rule(self) -> RateLimitRule {
        match self {
            Self::Strict => RateLimitRule {
                limit: 5,
                window: DEFAULT_WINDOW,
                message: "Too many requests. Please try again later.",
            },
            Self::Moderate => RateLimitRule {
                limit: 30,
                window: DEFAULT_WINDOW,
                message: "Too many requests. Please slow down.",
            },
            Self::Lenient => RateLimitRule {
                limit: 100,
                window: DEFAULT_WINDOW,
                message: "Rate limit exceeded. Please try again later.",
            },
            Self::VeryStrict => RateLimitRule {
                limit: 3,
                window: DEFAULT_WINDOW,
                message: "Too many sensitive requests. Please wait before trying again.",
            },
        }
    }

    /// Tier for a request, or `None` when the route is not limited.
    ///
    /// Paths outside the participant and auth-key routes only reach the
    /// not-found fallback and share the lenient tier.
    pub fn for_request(method: &Method, path: &str) -> Option<Self> {
        if *method == Method::OPTIONS || path == "/api/health" {
            return None;
        }
        if path == "/api/auth-key" {
            return Some(Self::VeryStrict);
        }
        if path != "/api/participants" && !path.starts_with("/api/participants/") {
            return Some(Self::Lenient);
        }
        if *method == Method::GET {
            Some(Self::Moderate)
        } else {
            Some(Self::Strict)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_at_ms: u64,
    },
    Limited {
        limit: u32,
        reset_at_ms: u64,
        retry_after_secs: u64,
    },
}

#[derive(Default)]
pub struct FixedWindowLimiter {
    entries: Mutex<HashMap<(RateLimitTier, String), WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request for `key` at `now_ms`.
    pub fn check(&self, tier: RateLimitTier, key: &str, now_ms: u64) -> RateDecision {
        let rule = tier.rule();
        let window_ms = u64::try_from(rule.window.as_millis()).unwrap_or(u64::MAX);
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        entries.retain(|_, entry| now_ms <= entry.reset_at_ms);

        let entry = entries
            .entry((tier, key.to_string()))
            .or_insert(WindowEntry {
                count: 0,
                reset_at_ms: now_ms.saturating_add(window_ms),
            });

        if entry.count >= rule.limit {
            let remaining_ms = entry.reset_at_ms.saturating_sub(now_ms);
            return RateDecision::Limited {
                limit: rule.limit,
                reset_at_ms: entry.reset_at_ms,
                retry_after_secs: remaining_ms.div_ceil(1000).max(1),
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            limit: rule.limit,
            remaining: rule.limit - entry.count,
            reset_at_ms: entry.reset_at_ms,
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.rate_limit_enabled {
        return next.run(req).await;
    }

    let path = req.uri().path().to_string();
    let Some(tier) = RateLimitTier::for_request(req.method(), &path) else {
        return next.run(req).await;
    };

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = client_ip(req.headers(), peer);
    let key = format!("{client_ip}:{path}");
    match state.limiter.check(tier, &key, now_epoch_ms()) {
        RateDecision::Allowed {
            limit,
            remaining,
            reset_at_ms,
        } => {
            let mut resp = next.run(req).await;
            insert_limit_headers(resp.headers_mut(), limit, remaining, reset_at_ms);
            resp
        }
        RateDecision::Limited {
            limit,
            reset_at_ms,
            retry_after_secs,
        } => {
            info!(
                "event=rate_limited module=middleware status=rejected tier={:?} path={} retry_after_secs={}",
                tier, path, retry_after_secs
            );
            let body = Json(json!({
                "error": tier.rule().message,
                "retryAfter": retry_after_secs,
            }));
            let mut resp = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            insert_limit_headers(resp.headers_mut(), limit, 0, reset_at_ms);
            resp
        }
    }
}

fn insert_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_at_ms: u64) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(reset_at_ms));
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then `CF-Connecting-IP`,
/// then the socket peer. `"unknown"` only when none of them is available.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(first) = header_text("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return first.to_string();
    }

    header_text("x-real-ip")
        .or_else(|| header_text("cf-connecting-ip"))
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn now_epoch_ms() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        Err(err) => {
            warn!("event=clock_skew module=middleware status=warn error={err}");
            0
        }
    }
}
