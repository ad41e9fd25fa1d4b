//! # Per-Tenant Rate Limiting
//!
//! Fixed-window rate limiter keyed by the tenant of the request path.
//! Requests outside `/v1/tenants/{tenant_id}/...`, or whose tenant segment
//! is not a valid tenant ID, share one bucket. Once the map grows past
//! [`SWEEP_THRESHOLD`] buckets, expired windows are evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mops_core::TenantId;
use parking_lot::Mutex;

use crate::error::{ErrorBody, ErrorDetail};

/// Bucket count above which expired buckets are swept.
pub const SWEEP_THRESHOLD: usize = 10_000;

/// Which budget a request is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BucketKey {
    Tenant(TenantId),
    /// Not tenant-scoped, or an unparseable tenant segment.
    Shared,
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tenant(id) => write!(f, "{id}"),
            Self::Shared => f.write_str("shared"),
        }
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    /// Window duration in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
struct BucketState {
    count: u64,
    window_start: Instant,
}

/// Shared rate limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<HashMap<BucketKey, BucketState>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request against `key`; false once the window's budget is spent.
    fn check(&self, key: BucketKey) -> bool {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();

        if buckets.len() >= SWEEP_THRESHOLD && !buckets.contains_key(&key) {
            let window = self.config.window_secs;
            buckets.retain(|_, b| now.duration_since(b.window_start).as_secs() < window);
        }

        let bucket = buckets.entry(key).or_insert(BucketState {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start).as_secs() >= self.config.window_secs {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.config.max_requests {
            false
        } else {
            bucket.count += 1;
            true
        }
    }

    /// Number of live buckets.
    fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// The tenant segment of `/v1/tenants/{tenant_id}/...`, if present.
fn tenant_key(path: &str) -> Option<&str> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some("v1"), Some("tenants"), Some(tenant)) if !tenant.is_empty() => Some(tenant),
        _ => None,
    }
}

fn bucket_key(path: &str) -> BucketKey {
    tenant_key(path)
        .and_then(|segment| segment.parse::<TenantId>().ok())
        .map_or(BucketKey::Shared, BucketKey::Tenant)
}

/// Middleware that enforces per-tenant rate limits.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter {
        let key = bucket_key(request.uri().path());

        if !limiter.check(key) {
            tracing::warn!(bucket = %key, "rate limit exceeded");
            let body = ErrorBody {
                error: ErrorDetail {
                    code: "RATE_LIMITED".to_string(),
                    message: "rate limit exceeded".to_string(),
                    details: None,
                },
            };
            return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        }
    }

    next.run(request).await
}
