//! Shared helpers for the router-level tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use site_gateway::AppState;
use site_gateway::cache::ResponseCache;
use site_gateway::cors::CorsPolicy;
use site_gateway::rate_limit::{InMemoryCounterStore, Quota, RateLimitPolicy};
use site_gateway::state::Upstreams;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "https://example.com";

/// Gateway state with isolated in-process counters.
pub fn state(standard: u32, strict: u32, upstreams: Upstreams) -> Arc<AppState> {
    let store = Arc::new(InMemoryCounterStore::new(Duration::from_secs(60)));
    Arc::new(AppState {
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .no_proxy()
            .build()
            .unwrap(),
        limiter: RateLimitPolicy::new(store, Quota::new(standard, 60), Quota::new(strict, 60)),
        cors: CorsPolicy::new(vec![ALLOWED_ORIGIN.to_string()], None),
        cache: ResponseCache::new(Duration::from_secs(300)),
        upstreams,
    })
}

pub fn app(standard: u32, strict: u32) -> Router {
    site_gateway::router(state(standard, strict, Upstreams::default()))
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub fn post_json(uri: &str, client: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str, client: &str) -> Request<Body> {
    Request::get(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(resp: &'a Response<Body>, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Serves `upstream` on an ephemeral port and returns its base URL.
pub async fn spawn_upstream(upstream: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });

    format!("http://{addr}")
}
