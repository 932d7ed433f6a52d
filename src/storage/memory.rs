use std::hash::Hash;
use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;

use super::{KeyValueStore, MetadataRepository, RatingRepository, StorageError};
use crate::model::{Metadata, MovieId, NewMetadata, Rating};

// 基于 DashMap 的内存键值存储
#[derive(Debug)]
pub struct MemoryStore<K: Eq + Hash, V> {
    entries: DashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[tonic::async_trait]
impl<K, V> KeyValueStore<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    async fn get(&self, key: &K) -> Result<V, StorageError> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::NotFound)
    }

    async fn put(&self, key: K, value: V) -> Result<(), StorageError> {
        self.entries.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &K) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// 内存元数据仓储，ID 从 1 开始递增
#[derive(Debug)]
pub struct MemoryMetadataRepository {
    store: MemoryStore<MovieId, Metadata>,
    next_id: AtomicI32,
}

impl Default for MemoryMetadataRepository {
    fn default() -> Self {
        Self {
            store: MemoryStore::new(),
            next_id: AtomicI32::new(1),
        }
    }
}

#[tonic::async_trait]
impl MetadataRepository for MemoryMetadataRepository {
    async fn get(&self, id: MovieId) -> Result<Metadata, StorageError> {
        self.store.get(&id).await
    }

    async fn insert(&self, metadata: NewMetadata) -> Result<Metadata, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let metadata = metadata.with_id(id);
        self.store.put(id, metadata.clone()).await?;
        Ok(metadata)
    }
}

// 内存评分仓储
#[derive(Debug, Default)]
pub struct MemoryRatingRepository {
    ratings: DashMap<MovieId, Vec<Rating>>,
}

#[tonic::async_trait]
impl RatingRepository for MemoryRatingRepository {
    async fn get(&self, movie_id: MovieId) -> Result<Vec<Rating>, StorageError> {
        match self.ratings.get(&movie_id) {
            Some(entry) if !entry.is_empty() => Ok(entry.value().clone()),
            _ => Err(StorageError::NotFound),
        }
    }

    async fn put(&self, rating: Rating) -> Result<(), StorageError> {
        self.ratings.entry(rating.movie_id).or_default().push(rating);
        Ok(())
    }
}
