//! # Intake Rate Limiting
//!
//! Only `POST /` is throttled: it is the route exposed to web pages, and
//! every accepted post turns into store writes the exploration loop then
//! has to work through. Status and maintenance calls come from the
//! operator and are left alone.
//!
//! `XANTHIPPE_INTAKE_RATE_LIMIT` sets posts per second (default 20, 0 turns
//! the limiter off). A post over quota is answered 429 and nothing is
//! requested.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Environment variable holding the intake rate.
pub const INTAKE_RATE_LIMIT_ENV: &str = "XANTHIPPE_INTAKE_RATE_LIMIT";

/// Posts per second when the variable is unset or unparsable.
pub const DEFAULT_INTAKE_RATE_LIMIT: u32 = 20;

/// Limiter in front of the intake route.
pub type IntakeLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Build a limiter allowing `posts_per_second`, or `None` for 0.
pub fn create_intake_limiter(posts_per_second: u32) -> Option<IntakeLimiter> {
    NonZeroU32::new(posts_per_second)
        .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))))
}

/// Configured intake rate, 0 meaning disabled.
pub fn intake_rate_from_env() -> u32 {
    std::env::var(INTAKE_RATE_LIMIT_ENV)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_INTAKE_RATE_LIMIT)
}

/// Answer 429 once the intake quota is spent.
pub async fn intake_rate_limit(
    State(limiter): State<IntakeLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if limiter.check().is_err() {
        tracing::warn!(event = "intake_rate_limited", "Intake post over quota");
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================
