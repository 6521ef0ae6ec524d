use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE};

const MAX_CACHE_ENTRIES: usize = 1_000;

// Cached upstream body with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub body: String,
    pub created_at: Instant,
}

/// TTL cache for successful upstream responses.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let hit = self
            .entries
            .get(key)
            .filter(|e| e.created_at.elapsed() < self.ttl)
            .map(|e| e.body.clone());

        if hit.is_some() {
            CACHE_HITS.inc();
        } else {
            CACHE_MISSES.inc();
        }
        hit
    }

    pub fn insert(&self, key: String, body: String) {
        if self.ttl.is_zero() {
            return;
        }
        if self.entries.len() >= MAX_CACHE_ENTRIES {
            let ttl = self.ttl;
            self.entries.retain(|_, e| e.created_at.elapsed() < ttl);
            if self.entries.len() >= MAX_CACHE_ENTRIES {
                self.entries.clear();
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                body,
                created_at: Instant::now(),
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Create a cache key (hash of endpoint + sorted query)
pub fn make_cache_key(endpoint: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(endpoint);
    for (k, v) in sorted {
        hasher.update([0u8]);
        hasher.update(k);
        hasher.update([b'=']);
        hasher.update(v);
    }
    format!("{:x}", hasher.finalize())
}
