//! # HTTP Middleware
//!
//! - `metrics`: request, error and gate-rejection counters.
//! - `rate_limit`: fixed-window limiter keyed by tenant.

pub mod metrics;
pub mod rate_limit;
