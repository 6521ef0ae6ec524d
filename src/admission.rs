//! Admission gate in front of the proxy handlers.
//!
//! Every non-preflight request is checked against the rate limit policy
//! before it reaches a handler. Denied requests end here with a 429; admitted
//! ones get the `X-RateLimit-*` headers added to the handler's response.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, info};

use crate::identity::client_identifier;
use crate::metrics::ADMISSION_CHECKS;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceeded {
    pub error: &'static str,
    pub message: String,
    pub retry_after: u64,
}

impl RateLimitExceeded {
    pub fn new(retry_after: u64) -> Self {
        Self {
            error: "Rate limit exceeded",
            message: format!("Too many requests. Please try again in {retry_after} seconds."),
            retry_after,
        }
    }
}

pub fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
}

/// Structured 429 with `Retry-After` and a zero remaining count.
pub fn denied_response(limit: u32, retry_after: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitExceeded::new(retry_after)),
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    set_rate_limit_headers(headers, limit, 0);
    response
}

pub async fn admission_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    // Preflights never touch the limiter
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let identifier = client_identifier(req.headers());
    let path = req.uri().path().to_string();
    let (quota, decision) = state.limiter.evaluate(&path, &identifier).await;

    if !decision.allowed {
        ADMISSION_CHECKS.with_label_values(&["denied"]).inc();
        let retry_after = decision
            .retry_after_secs
            .unwrap_or_else(|| quota.window.as_secs());
        info!(client = %identifier, path = %path, retry_after, "rate limit exceeded");
        return denied_response(quota.max_requests, retry_after);
    }

    ADMISSION_CHECKS.with_label_values(&["allowed"]).inc();
    debug!(client = %identifier, path = %path, remaining = decision.remaining, "request admitted");

    let mut response = next.run(req).await;
    set_rate_limit_headers(response.headers_mut(), quota.max_requests, decision.remaining);
    response
}
