//! # Request Metrics
//!
//! In-process atomic counters, readable at `GET /v1/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    gate_rejection_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return current request count.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Return current error count (4xx and 5xx, gate rejections included).
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Return how many writes the server-side gate has refused.
    pub fn gate_rejections(&self) -> u64 {
        self.gate_rejection_count.load(Ordering::Relaxed)
    }

    fn record(&self, status: StatusCode) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() || status.is_server_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if status == StatusCode::CONFLICT {
            self.gate_rejection_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests(),
            errors: self.errors(),
            gate_rejections: self.gate_rejections(),
        }
    }
}

/// Counter values returned by `GET /v1/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub gate_rejections: u64,
}

/// Middleware that increments request, error and gate-rejection counters.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(response.status());
    }

    response
}

/// GET /v1/metrics: Current counter values.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    responses(
        (status = 200, description = "Counter values", body = MetricsSnapshot),
    ),
    tag = "operations"
)]
pub async fn metrics_snapshot(Extension(metrics): Extension<ApiMetrics>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_classifies_statuses() {
        let metrics = ApiMetrics::new();
        metrics.record(StatusCode::OK);
        metrics.record(StatusCode::NOT_FOUND);
        metrics.record(StatusCode::CONFLICT);
        metrics.record(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                requests: 4,
                errors: 3,
                gate_rejections: 1,
            }
        );
    }

    #[test]
    fn clones_share_counters() {
        let metrics = ApiMetrics::new();
        let other = metrics.clone();
        metrics.record(StatusCode::OK);
        assert_eq!(other.requests(), 1);
    }
}
