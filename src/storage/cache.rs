use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::{KeyValueStore, StorageError};

/// 默认缓存有效期
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// 带过期时间的内存缓存，读取时惰性淘汰过期项
#[derive(Debug)]
pub struct TtlCache<K: Eq + Hash, V> {
    entries: DashMap<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl<K: Eq + Hash, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[tonic::async_trait]
impl<K, V> KeyValueStore<K, V> for TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    async fn get(&self, key: &K) -> Result<V, StorageError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if now < *expires_at {
                return Ok(value.clone());
            }
        }
        self.entries.remove_if(key, |_, (_, expires_at)| now >= *expires_at);
        Err(StorageError::NotFound)
    }

    async fn put(&self, key: K, value: V) -> Result<(), StorageError> {
        self.entries.insert(key, (value, Instant::now() + self.ttl));
        Ok(())
    }

    async fn remove(&self, key: &K) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache: TtlCache<i32, f64> = TtlCache::new(Duration::from_secs(60));
        cache.put(1, 4.5).await.unwrap();
        assert_eq!(cache.get(&1).await.unwrap(), 4.5);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&1).await.is_ok());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&1).await.unwrap_err().is_not_found());
    }
}
