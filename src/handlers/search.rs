//! `POST /api/search`: relays site search to the AI Search API.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::ProxyError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::models::{SearchRequest, SearchResults, UpstreamSearchRequest};
use crate::state::AppState;

pub async fn search_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: SearchRequest = serde_json::from_slice(&body).unwrap_or_default();

    let Some(query) = request.query() else {
        return Json(json!({ "results": [], "count": 0 })).into_response();
    };

    match forward_search(&state, query, request.top_k()).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => {
            error!(error = %e, "search request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Search failed",
                    "message": e.to_string(),
                    "results": [],
                })),
            )
                .into_response()
        }
    }
}

async fn forward_search(state: &AppState, query: &str, top_k: Option<u32>) -> Result<SearchResults, ProxyError> {
    let upstreams = &state.upstreams;
    let token = upstreams
        .ai_search_token
        .as_deref()
        .ok_or(ProxyError::NotConfigured("AI_SEARCH_TOKEN"))?;
    let url = upstreams
        .ai_search_url
        .as_deref()
        .ok_or(ProxyError::NotConfigured("AI_SEARCH_URL"))?;

    debug!(query, "relaying site search");
    let start = Instant::now();
    let res = state
        .client
        .post(url)
        .bearer_auth(token)
        .json(&UpstreamSearchRequest {
            query,
            max_num_results: top_k.unwrap_or(upstreams.max_search_results),
            rewrite_query: true,
            stream: false,
        })
        .send()
        .await;
    UPSTREAM_LATENCY
        .with_label_values(&["search"])
        .observe(start.elapsed().as_secs_f64());

    let res = res?;
    if !res.status().is_success() {
        return Err(ProxyError::UpstreamStatus(res.status()));
    }

    let data: Value = res.json().await?;
    Ok(SearchResults::from_upstream(query, &data))
}
