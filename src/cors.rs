//! Origin allow-list and preflight responses for the `/api` routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub const PREFLIGHT_MAX_AGE: &str = "86400";

#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    preview_domain: Option<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>, preview_domain: Option<String>) -> Self {
        Self {
            allowed_origins,
            preview_domain: preview_domain
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
            || self.is_preview(origin)
            || is_local(origin)
    }

    // https://<domain> or https://<label>.<...>.<domain>
    fn is_preview(&self, origin: &str) -> bool {
        let Some(domain) = &self.preview_domain else {
            return false;
        };
        let Some(host) = origin.strip_prefix("https://") else {
            return false;
        };
        if host == domain {
            return true;
        }
        host.strip_suffix(domain.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|labels| labels.split('.').all(is_dns_label))
    }

    /// Adds the origin-specific headers when `origin` is allowed.
    pub fn apply(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        let Some(origin) = origin.filter(|o| self.is_allowed(o)) else {
            return;
        };
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }
}

fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

// http://localhost or http://127.0.0.1, optional numeric port
fn is_local(origin: &str) -> bool {
    let Some(host) = origin.strip_prefix("http://") else {
        return false;
    };
    let (name, port) = match host.split_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };
    (name == "localhost" || name == "127.0.0.1")
        && port.is_none_or(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Decorates every response with the origin headers, including 429s and
/// preflights produced further down the stack.
pub async fn cors_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(req).await;
    state.cors.apply(origin.as_deref(), response.headers_mut());
    response
}

/// 204 preflight answer for a route accepting `methods`.
pub fn preflight(methods: &'static str) -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, methods),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE),
        ],
    )
        .into_response()
}
