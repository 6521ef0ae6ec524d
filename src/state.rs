use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::config::Args;
use crate::cors::CorsPolicy;
use crate::rate_limit::{CounterStore, DurableCounterStore, InMemoryCounterStore, Quota, RateLimitPolicy, RedisKv};

/// Upstream endpoints and credentials for the proxy handlers.
#[derive(Debug, Clone, Default)]
pub struct Upstreams {
    pub ai_url: Option<String>,
    pub system_instruction: String,
    pub rag_id: String,
    pub ai_gateway_id: String,
    pub max_search_results: u32,
    pub ai_search_url: Option<String>,
    pub ai_search_token: Option<String>,
    pub youtube_api_key: Option<String>,
    pub youtube_api_base: String,
    pub cf_api_token: Option<String>,
    pub cf_zone_id: Option<String>,
    pub cf_proxy_secret: Option<String>,
    pub cf_api_base: String,
}

// app's shared state
pub struct AppState {
    pub client: reqwest::Client,
    pub limiter: RateLimitPolicy,
    pub cors: CorsPolicy,
    pub cache: ResponseCache,
    pub upstreams: Upstreams,
}

impl AppState {
    pub fn from_args(args: &Args) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.upstream_timeout))
            .build()?;

        let store = counter_store(
            args.redis_url.as_deref(),
            Duration::from_secs(args.rate_window),
            Duration::from_millis(args.store_timeout_ms),
        );
        let limiter = RateLimitPolicy::new(
            store,
            Quota::new(args.rate_limit, args.rate_window),
            Quota::new(args.ai_rate_limit, args.rate_window),
        );

        Ok(Self {
            client,
            limiter,
            cors: CorsPolicy::new(args.origin_list(), args.preview_domain.clone()),
            cache: ResponseCache::new(Duration::from_secs(args.cache_ttl)),
            upstreams: Upstreams {
                ai_url: args.ai_upstream.clone(),
                system_instruction: args.system_instruction.clone(),
                rag_id: args.rag_id.clone(),
                ai_gateway_id: args.ai_gateway_id.clone(),
                max_search_results: args.max_search_results,
                ai_search_url: args.ai_search_url.clone(),
                ai_search_token: args.ai_search_token.clone(),
                youtube_api_key: args.youtube_api_key.clone(),
                youtube_api_base: args.youtube_api_base.trim_end_matches('/').to_string(),
                cf_api_token: args.cf_api_token.clone(),
                cf_zone_id: args.cf_zone_id.clone(),
                cf_proxy_secret: args.cf_proxy_secret.clone(),
                cf_api_base: args.cf_api_base.trim_end_matches('/').to_string(),
            },
        })
    }
}

/// Picks the counter store once at startup: Redis when a usable URL is
/// given, in-process counters otherwise.
pub fn counter_store(redis_url: Option<&str>, window: Duration, store_timeout: Duration) -> Arc<dyn CounterStore> {
    match redis_url.map(RedisKv::open) {
        Some(Ok(kv)) => {
            info!("Rate limiter using Redis counters");
            Arc::new(DurableCounterStore::new(kv, window).with_timeout(store_timeout))
        }
        Some(Err(e)) => {
            warn!(error = %e, "Invalid Redis URL, using in-process counters");
            Arc::new(InMemoryCounterStore::new(window))
        }
        None => {
            info!("Rate limiter using in-process counters");
            Arc::new(InMemoryCounterStore::new(window))
        }
    }
}
