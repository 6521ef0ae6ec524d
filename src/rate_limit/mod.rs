//! Fixed-window rate limiting.
//!
//! A [`CounterStore`] counts requests per identifier inside a window and
//! answers with a [`RateLimitDecision`]. Stores never fail from the caller's
//! point of view: the durable store falls back to in-process counters when
//! its backend is unavailable.

mod durable;
mod memory;
mod policy;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use durable::{DEFAULT_STORE_TIMEOUT, DurableCounterStore, KEY_PREFIX, KvStore, RedisKv};
pub use memory::InMemoryCounterStore;
pub use policy::{AI_ENDPOINT_MARKER, RateLimitPolicy};

/// Window length and request cap for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub window: Duration,
    pub max_requests: u32,
}

impl Quota {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            max_requests,
        }
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Only set when the request was denied.
    pub retry_after_secs: Option<u64>,
}

impl RateLimitDecision {
    pub fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_secs: None,
        }
    }

    pub fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs: Some(retry_after_secs),
        }
    }
}

/// Errors raised by a key-value backend. Never leave the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Counts requests per identifier within the store's window.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn check_and_increment(&self, identifier: &str, max_requests: u32) -> RateLimitDecision;

    /// Short name for logs and metrics labels.
    fn backend(&self) -> &'static str;
}
