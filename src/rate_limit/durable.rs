use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{CounterStore, InMemoryCounterStore, RateLimitDecision, StoreError};
use crate::metrics::STORE_FALLBACKS;

pub const KEY_PREFIX: &str = "rl:";

/// Upper bound on one remote check before the fallback answers.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

/// Minimal key-value contract needed by [`DurableCounterStore`].
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` and (re)sets the key's expiry to `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Time left before `key` expires, for stores that can report it.
    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
        Ok(None)
    }
}

/// Redis-backed [`KvStore`] sharing one reconnecting connection.
pub struct RedisKv {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisKv {
    /// Validates the URL; connects on first use.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection().await?;
        // -2: missing key, -1: no expiry
        let secs: i64 = conn.ttl(key).await?;
        Ok(u64::try_from(secs).ok().map(Duration::from_secs))
    }
}

/// Counters shared across gateway instances through a key-value store.
///
/// The read-then-write is not atomic, so concurrent requests from one client
/// can lose increments. Backend failures, and checks that take longer than
/// the store timeout, are answered by an in-process fallback store for that
/// request.
pub struct DurableCounterStore<K> {
    kv: K,
    window: Duration,
    timeout: Duration,
    fallback: InMemoryCounterStore,
}

impl<K: KvStore> DurableCounterStore<K> {
    pub fn new(kv: K, window: Duration) -> Self {
        Self {
            kv,
            window,
            timeout: DEFAULT_STORE_TIMEOUT,
            fallback: InMemoryCounterStore::new(window),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fallback(&self) -> &InMemoryCounterStore {
        &self.fallback
    }

    /// Remaining key TTL when the store reports one, else the full window.
    async fn retry_after(&self, key: &str) -> u64 {
        let window = self.window.as_secs().max(1);
        match self.kv.ttl(key).await {
            Ok(Some(left)) => left.as_secs().clamp(1, window),
            Ok(None) => window,
            Err(e) => {
                debug!(error = %e, "ttl lookup failed, reporting full window");
                window
            }
        }
    }

    async fn check_remote(&self, identifier: &str, max_requests: u32) -> Result<RateLimitDecision, StoreError> {
        let key = format!("{KEY_PREFIX}{identifier}");
        let count = self
            .kv
            .get(&key)
            .await?
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(0);

        if count >= max_requests {
            return Ok(RateLimitDecision::deny(self.retry_after(&key).await));
        }

        self.kv
            .put(&key, &(count + 1).to_string(), self.window)
            .await?;
        Ok(RateLimitDecision::allow(max_requests - count - 1))
    }
}

#[async_trait]
impl<K: KvStore> CounterStore for DurableCounterStore<K> {
    async fn check_and_increment(&self, identifier: &str, max_requests: u32) -> RateLimitDecision {
        let outcome = match timeout(self.timeout, self.check_remote(identifier, max_requests)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StoreError::Unavailable(format!(
                "no reply within {}ms",
                self.timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, identifier, "counter store failed, using in-process counters");
                STORE_FALLBACKS.inc();
                self.fallback.check(identifier, max_requests)
            }
        }
    }

    fn backend(&self) -> &'static str {
        "durable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    const MINUTE: Duration = Duration::from_secs(60);

    #[derive(Default)]
    struct MapKv {
        data: DashMap<String, (String, Duration)>,
    }

    #[async_trait]
    impl KvStore for MapKv {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.data.get(key).map(|e| e.0.clone()))
        }

        async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
            self.data.insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }
    }

    #[derive(Default)]
    struct DownKv {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KvStore for DownKv {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn writes_prefixed_key_with_window_ttl() {
        let store = DurableCounterStore::new(MapKv::default(), MINUTE);
        let d = store.check_and_increment("1.1.1.1", 3).await;
        assert_eq!(d, RateLimitDecision::allow(2));

        let entry = store.kv.data.get("rl:1.1.1.1").unwrap();
        assert_eq!(entry.0, "1");
        assert_eq!(entry.1, MINUTE);
    }

    #[tokio::test]
    async fn two_request_scenario() {
        let store = DurableCounterStore::new(MapKv::default(), MINUTE);
        assert_eq!(store.check_and_increment("1.1.1.1", 2).await, RateLimitDecision::allow(1));
        assert_eq!(store.check_and_increment("1.1.1.1", 2).await, RateLimitDecision::allow(0));
        assert_eq!(store.check_and_increment("1.1.1.1", 2).await, RateLimitDecision::deny(60));
        // denial does not write
        assert_eq!(store.kv.data.get("rl:1.1.1.1").unwrap().0, "2");
    }

    struct TtlKv {
        inner: MapKv,
        left: Duration,
    }

    #[async_trait]
    impl KvStore for TtlKv {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
            self.inner.put(key, value, ttl).await
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
            Ok(Some(self.left))
        }
    }

    #[tokio::test]
    async fn denial_uses_reported_ttl() {
        let kv = TtlKv {
            inner: MapKv::default(),
            left: Duration::from_secs(12),
        };
        let store = DurableCounterStore::new(kv, MINUTE);
        store.check_and_increment("x", 1).await;
        assert_eq!(store.check_and_increment("x", 1).await, RateLimitDecision::deny(12));
    }

    #[tokio::test]
    async fn expiring_key_reports_at_least_one_second() {
        for left in [Duration::ZERO, Duration::from_millis(400)] {
            let kv = TtlKv {
                inner: MapKv::default(),
                left,
            };
            let store = DurableCounterStore::new(kv, MINUTE);
            store.check_and_increment("x", 1).await;
            assert_eq!(store.check_and_increment("x", 1).await, RateLimitDecision::deny(1));
        }
    }

    #[tokio::test]
    async fn reported_ttl_is_capped_at_window() {
        let kv = TtlKv {
            inner: MapKv::default(),
            left: Duration::from_secs(600),
        };
        let store = DurableCounterStore::new(kv, MINUTE);
        store.check_and_increment("x", 1).await;
        assert_eq!(store.check_and_increment("x", 1).await, RateLimitDecision::deny(60));
    }

    #[tokio::test]
    async fn malformed_count_reads_as_zero() {
        let kv = MapKv::default();
        kv.data.insert("rl:x".into(), ("garbage".into(), MINUTE));
        let store = DurableCounterStore::new(kv, MINUTE);
        assert_eq!(store.check_and_increment("x", 5).await, RateLimitDecision::allow(4));
        assert_eq!(store.kv.data.get("rl:x").unwrap().0, "1");
    }

    #[tokio::test]
    async fn negative_count_reads_as_zero() {
        let kv = MapKv::default();
        kv.data.insert("rl:x".into(), ("-4".into(), MINUTE));
        let store = DurableCounterStore::new(kv, MINUTE);
        assert_eq!(store.check_and_increment("x", 5).await, RateLimitDecision::allow(4));
    }

    #[tokio::test]
    async fn backend_failure_uses_fallback() {
        let store = DurableCounterStore::new(DownKv::default(), MINUTE);
        let d = store.check_and_increment("x", 2).await;
        assert_eq!(d, RateLimitDecision::allow(1));
        assert_eq!(store.kv.calls.load(Ordering::Relaxed), 1);
        assert_eq!(store.fallback().len(), 1);
    }

    struct StalledKv;

    #[async_trait]
    impl KvStore for StalledKv {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            std::future::pending().await
        }

        async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out_to_fallback() {
        let store = DurableCounterStore::new(StalledKv, MINUTE).with_timeout(Duration::from_millis(250));
        let started = tokio::time::Instant::now();

        assert_eq!(store.check_and_increment("x", 2).await, RateLimitDecision::allow(1));
        assert_eq!(store.check_and_increment("x", 2).await, RateLimitDecision::allow(0));
        assert!(!store.check_and_increment("x", 2).await.allowed);

        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(750) && waited < Duration::from_secs(1));
        assert_eq!(store.fallback().len(), 1);
    }

    #[tokio::test]
    async fn silent_redis_server_falls_back() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let kv = RedisKv::open(&format!("redis://{addr}")).unwrap();
        let store = DurableCounterStore::new(kv, MINUTE).with_timeout(Duration::from_millis(200));

        for remaining in [4, 3] {
            let decision = tokio::time::timeout(Duration::from_secs(5), store.check_and_increment("x", 5))
                .await
                .expect("fallback answers within the store timeout");
            assert_eq!(decision, RateLimitDecision::allow(remaining));
        }
        assert_eq!(store.fallback().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_matches_in_memory_sequence() {
        let durable = DurableCounterStore::new(DownKv::default(), MINUTE);
        let memory = InMemoryCounterStore::new(MINUTE);

        let mut got = Vec::new();
        let mut want = Vec::new();
        for step in 0..12 {
            if step == 7 {
                advance(MINUTE + Duration::from_secs(1)).await;
            } else if step > 0 {
                advance(Duration::from_secs(3)).await;
            }
            got.push(durable.check_and_increment("1.2.3.4", 4).await);
            want.push(memory.check_and_increment("1.2.3.4", 4).await);
        }
        assert_eq!(got, want);
        assert!(got.iter().any(|d| !d.allowed));
    }
}
