//! Global token-bucket rate limiting

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::AppError;

/// Process-wide limiter shared by every request
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Build the limiter, or `None` when limiting is disabled or misconfigured
pub fn limiter(config: &RateLimitConfig) -> Option<Arc<Limiter>> {
    if !config.enabled {
        return None;
    }

    let rate = NonZeroU32::new(config.requests_per_second)?;
    let burst = NonZeroU32::new(config.burst_size)?;
    let quota = Quota::per_second(rate).allow_burst(burst);

    Some(Arc::new(RateLimiter::direct(quota)))
}

/// Reject the request with 429 once the bucket is empty
pub async fn enforce(State(limiter): State<Arc<Limiter>>, request: Request, next: Next) -> Response {
    if limiter.check().is_err() {
        debug!(path = %request.uri().path(), "Rate limit exceeded");
        return AppError::RateLimited.into_response();
    }

    next.run(request).await
}
