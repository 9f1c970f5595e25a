use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide request quota for a route group
pub struct RateLimitLayer {
    limiter: RateLimiter<NotKeyed, InMemoryState, governor::clock::DefaultClock>,
}

impl RateLimitLayer {
    pub fn new(requests: u32, per_seconds: u64) -> Self {
        let quota = Quota::with_period(Duration::from_secs(per_seconds))
            .unwrap()
            .allow_burst(NonZeroU32::new(requests).unwrap());

        RateLimitLayer {
            limiter: RateLimiter::direct(quota),
        }
    }

    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Rate limiting middleware, applied to the public checkout route
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimitLayer>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    if !limiter.check() {
        let response = (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        );
        return Err(response.into_response());
    }

    Ok(next.run(req).await)
}
