//! Rate limiting, preflight and request logging middleware.

use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Message sent with 429 responses.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

/// Global rate limiter (not keyed by client).
pub type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    pub global: Arc<GlobalLimiter>,
}

impl RateLimitState {
    /// Allow `requests_per_minute` requests across all clients.
    pub fn new(requests_per_minute: NonZeroU32) -> Self {
        Self {
            global: Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute))),
        }
    }

    /// Limiter for a configured rate. Zero means no limiting.
    pub fn per_minute(requests_per_minute: u32) -> Option<Self> {
        NonZeroU32::new(requests_per_minute).map(Self::new)
    }
}

/// Reject requests over the global limit with 429 Too Many Requests.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if rate_limit.global.check().is_err() {
        warn!(uri = %request.uri(), "Global rate limit exceeded");
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            RATE_LIMIT_MESSAGE,
        ));
    }

    Ok(next.run(request).await)
}

/// Answer successful CORS preflight requests with 204 No Content.
pub async fn preflight_status_middleware(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;

    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Log method, uri, status and duration of every request.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    debug!(%method, %uri, "Request started");

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(%method, %uri, %status, ?duration, "Request failed");
    } else if status.is_client_error() {
        info!(%method, %uri, %status, ?duration, "Request rejected");
    } else {
        info!(%method, %uri, %status, ?duration, "Request completed");
    }

    response
}
