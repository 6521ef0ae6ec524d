//! Server-side relay for Cloudflare API calls that need the account token.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::info;

use crate::error::ProxyError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::state::{AppState, Upstreams};

pub const PROXY_SECRET_HEADER: &str = "x-proxy-secret";

fn check_secret(upstreams: &Upstreams, headers: &HeaderMap) -> Result<(), ProxyError> {
    let Some(expected) = upstreams.cf_proxy_secret.as_deref() else {
        return Ok(());
    };
    let given = headers
        .get(PROXY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if given == expected {
        Ok(())
    } else {
        Err(ProxyError::Forbidden)
    }
}

fn token(upstreams: &Upstreams) -> Result<&str, ProxyError> {
    upstreams
        .cf_api_token
        .as_deref()
        .ok_or(ProxyError::NotConfigured("CF_API_TOKEN"))
}

async fn relay(req: reqwest::RequestBuilder, token: &str) -> Result<Response, ProxyError> {
    let start = Instant::now();
    let res = req.bearer_auth(token).send().await;
    UPSTREAM_LATENCY
        .with_label_values(&["cloudflare"])
        .observe(start.elapsed().as_secs_f64());

    let res = res?;
    let status = res.status();
    let body: Value = res.json().await?;
    Ok((status, Json(body)).into_response())
}

/// `POST /api/cf/purge` with `{ "purge_everything": true }` or `{ "files": [...] }`.
pub async fn purge_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let upstreams = &state.upstreams;
    check_secret(upstreams, &headers)?;
    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::InvalidRequest(format!("Invalid JSON body: {e}")))?;
    let token = token(upstreams)?;
    let zone = upstreams
        .cf_zone_id
        .as_deref()
        .ok_or(ProxyError::NotConfigured("CF_ZONE_ID"))?;

    info!(zone, "relaying cache purge");
    let req = state
        .client
        .post(format!("{}/zones/{zone}/purge_cache", upstreams.cf_api_base))
        .json(&body);
    relay(req, token).await
}

/// `GET /api/cf/verify`: checks the configured token.
pub async fn verify_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, ProxyError> {
    let upstreams = &state.upstreams;
    check_secret(upstreams, &headers)?;
    let token = token(upstreams)?;

    let req = state
        .client
        .get(format!("{}/user/tokens/verify", upstreams.cf_api_base));
    relay(req, token).await
}
