use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Source of wall-clock time. Injected so TTL expiry and "current hour"
/// are deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Shared map whose entries expire a fixed time after they were written.
///
/// Concurrent misses on the same key may both fetch and both store; the
/// last write wins. Callers only store idempotent upstream data.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Fresh value and its age, or `None` if absent or expired.
    pub async fn get(&self, key: &K) -> Option<(V, Duration)> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        let age = self.clock.now() - entry.stored_at;
        if age < self.ttl {
            Some((entry.value.clone(), age))
        } else {
            None
        }
    }

    pub async fn set(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries
            .write()
            .await
            .insert(key, Entry { value, stored_at });
    }

    pub async fn remove(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ManualClock;
    use super::*;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let clock = clock();
        let cache: TtlCache<i64, String> = TtlCache::new(Duration::minutes(5), clock.clone());

        cache.set(1, "fresh".into()).await;
        clock.advance(Duration::minutes(4));
        let (value, age) = cache.get(&1).await.unwrap();
        assert_eq!(value, "fresh");
        assert_eq!(age, Duration::minutes(4));

        clock.advance(Duration::minutes(1));
        assert!(cache.get(&1).await.is_none());
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::hours(24), clock());
        cache.set("k", 1).await;
        cache.set("k", 2).await;
        assert_eq!(cache.get(&"k").await.map(|(v, _)| v), Some(2));
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let cache: TtlCache<i64, u32> = TtlCache::new(Duration::minutes(5), clock());
        cache.set(1, 10).await;
        cache.set(2, 20).await;

        cache.remove(&1).await;
        assert!(cache.get(&1).await.is_none());
        assert!(cache.get(&2).await.is_some());

        cache.clear().await;
        assert!(cache.get(&2).await.is_none());
    }
}
