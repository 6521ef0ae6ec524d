//! Rate-limited proxy gateway for a personal site's API endpoints.
//!
//! The `/api` routes sit behind an admission gate (per-client fixed-window
//! rate limiting) and a CORS layer; the handlers relay to the AI chat
//! upstream, the AI Search API, the YouTube Data API and the Cloudflare API.

pub mod admission;
pub mod cache;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use state::AppState;

use crate::admission::admission_middleware;
use crate::cors::{cors_middleware, preflight};
use crate::handlers::{
    ai_chat_handler, health_handler, metrics_handler, purge_handler, search_handler, verify_handler,
    youtube_handler,
};

//creating the router with routes
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/api/ai",
            post(ai_chat_handler).options(|| async { preflight("POST, OPTIONS") }),
        )
        .route(
            "/api/search",
            post(search_handler).options(|| async { preflight("POST, OPTIONS") }),
        )
        .route(
            "/api/youtube/{*endpoint}",
            get(youtube_handler).options(|| async { preflight("GET, OPTIONS") }),
        )
        .route(
            "/api/cf/purge",
            post(purge_handler).options(|| async { preflight("POST, OPTIONS") }),
        )
        .route(
            "/api/cf/verify",
            get(verify_handler).options(|| async { preflight("GET, OPTIONS") }),
        )
        .layer(from_fn_with_state(state.clone(), admission_middleware))
        .layer(from_fn_with_state(state.clone(), cors_middleware));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
