use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{CounterStore, RateLimitDecision};

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const MAX_TRACKED_CLIENTS: usize = 10_000;

// Rate limit entry - tracks requests per identifier
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

impl WindowCounter {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) > window
    }
}

/// Per-process fixed-window counters.
///
/// Counts are not shared between gateway instances, so limits are only
/// approximate when running more than one.
pub struct InMemoryCounterStore {
    window: Duration,
    counters: DashMap<String, WindowCounter>,
    last_sweep: Mutex<Instant>,
}

impl InMemoryCounterStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            counters: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn check(&self, identifier: &str, max_requests: u32) -> RateLimitDecision {
        let now = Instant::now();
        self.maybe_sweep(now);

        match self.counters.entry(identifier.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(WindowCounter::fresh(now));
                RateLimitDecision::allow(max_requests.saturating_sub(1))
            }
            Entry::Occupied(mut slot) => {
                let counter = slot.get_mut();

                // window expired..? start a new one
                if counter.is_expired(now, self.window) {
                    *counter = WindowCounter::fresh(now);
                    return RateLimitDecision::allow(max_requests.saturating_sub(1));
                }

                if counter.count >= max_requests {
                    let left = self
                        .window
                        .saturating_sub(now.duration_since(counter.window_start));
                    return RateLimitDecision::deny(ceil_secs(left).max(1));
                }

                counter.count += 1;
                RateLimitDecision::allow(max_requests - counter.count)
            }
        }
    }

    fn maybe_sweep(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock();
            if now.duration_since(*last) < SWEEP_INTERVAL {
                return;
            }
            *last = now;
        }

        let tracked = self.counters.len();
        if tracked > MAX_TRACKED_CLIENTS {
            debug!(tracked, "rate limiter map over capacity, clearing");
            self.counters.clear();
            return;
        }

        let window = self.window;
        self.counters.retain(|_, c| !c.is_expired(now, window));
        debug!(
            removed = tracked.saturating_sub(self.counters.len()),
            "swept expired rate limit windows"
        );
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn check_and_increment(&self, identifier: &str, max_requests: u32) -> RateLimitDecision {
        self.check(identifier, max_requests)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs + 1 } else { secs }
}
