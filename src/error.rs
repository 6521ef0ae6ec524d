//! Error envelope shared by the proxy handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    ForbiddenEndpoint(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream returned {0}")]
    UpstreamStatus(StatusCode),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden | Self::ForbiddenEndpoint(_) => StatusCode::FORBIDDEN,
            Self::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamStatus(s) => *s,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "Invalid request",
            Self::Forbidden => "Forbidden",
            Self::ForbiddenEndpoint(_) => "Forbidden endpoint",
            Self::NotConfigured(_) => "Configuration error",
            Self::Upstream(_) => "Proxy error",
            Self::UpstreamStatus(_) => "Upstream error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "proxy request failed");
        }
        let body = ErrorBody {
            error: self.title(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
