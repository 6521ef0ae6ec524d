use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use tracing::debug;

use crate::cache::make_cache_key;
use crate::error::ProxyError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::state::AppState;

pub const ALLOWED_ENDPOINTS: &[&str] = &["search", "videos", "channels", "playlists"];
const CACHE_CONTROL: &str = "public, max-age=300";

fn validate_endpoint(endpoint: &str) -> Result<(), ProxyError> {
    let base = endpoint.split('/').next().unwrap_or_default();
    let traverses = endpoint.split('/').any(|s| s == ".." || s == ".");
    if ALLOWED_ENDPOINTS.contains(&base) && !traverses {
        return Ok(());
    }
    Err(ProxyError::ForbiddenEndpoint(format!(
        "Endpoint '{endpoint}' is not allowed. Allowed: {}",
        ALLOWED_ENDPOINTS.join(", ")
    )))
}

fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        body,
    )
        .into_response()
}

pub async fn youtube_handler(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ProxyError> {
    validate_endpoint(&endpoint)?;

    let api_key = state
        .upstreams
        .youtube_api_key
        .as_deref()
        .ok_or(ProxyError::NotConfigured("YOUTUBE_API_KEY"))?;

    // the server key always replaces a client-supplied one
    let params: Vec<(String, String)> = params.into_iter().filter(|(k, _)| k != "key").collect();

    let cache_key = make_cache_key(&endpoint, &params);
    if let Some(body) = state.cache.get(&cache_key) {
        debug!(endpoint = %endpoint, "YouTube cache hit");
        return Ok(json_response(StatusCode::OK, body));
    }

    let mut url = Url::parse(&format!("{}/{endpoint}", state.upstreams.youtube_api_base))
        .map_err(|e| ProxyError::InvalidRequest(format!("Invalid YouTube API path: {e}")))?;
    url.query_pairs_mut()
        .extend_pairs(&params)
        .append_pair("key", api_key);

    let start = Instant::now();
    let res = state
        .client
        .get(url)
        .header(header::ACCEPT, "application/json")
        .send()
        .await;
    UPSTREAM_LATENCY
        .with_label_values(&["youtube"])
        .observe(start.elapsed().as_secs_f64());

    let res = res?;
    let status = res.status();
    let body = res.text().await?;

    if status.is_success() {
        state.cache.insert(cache_key, body.clone());
    } else {
        debug!(endpoint = %endpoint, %status, "YouTube API returned an error");
    }

    Ok(json_response(status, body))
}
