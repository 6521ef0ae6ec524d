use std::sync::Arc;

use super::{CounterStore, Quota, RateLimitDecision};

/// Paths containing this marker get the strict quota.
pub const AI_ENDPOINT_MARKER: &str = "/ai";

/// Chooses a quota per endpoint class and asks the store for a decision.
#[derive(Clone)]
pub struct RateLimitPolicy {
    store: Arc<dyn CounterStore>,
    standard: Quota,
    strict: Quota,
}

impl RateLimitPolicy {
    pub fn new(store: Arc<dyn CounterStore>, standard: Quota, strict: Quota) -> Self {
        Self {
            store,
            standard,
            strict,
        }
    }

    pub fn quota_for(&self, path: &str) -> Quota {
        if path.contains(AI_ENDPOINT_MARKER) {
            self.strict
        } else {
            self.standard
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn evaluate(&self, path: &str, identifier: &str) -> (Quota, RateLimitDecision) {
        let quota = self.quota_for(path);
        let decision = self
            .store
            .check_and_increment(identifier, quota.max_requests)
            .await;
        (quota, decision)
    }
}
