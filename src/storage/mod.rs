//! Storage and cache interfaces consumed by the service controllers.
//!
//! Only in-memory backends ship with the crate; relational stores and external
//! caches plug in through the same traits.

pub mod cache;
pub mod memory;

use thiserror::Error;

use crate::model::{Metadata, MovieId, NewMetadata, Rating};

pub use cache::TtlCache;
pub use memory::{MemoryMetadataRepository, MemoryRatingRepository, MemoryStore};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// 通用键值存储（数据库或缓存）
#[tonic::async_trait]
pub trait KeyValueStore<K, V>: Send + Sync + std::fmt::Debug
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    async fn get(&self, key: &K) -> Result<V, StorageError>;

    async fn put(&self, key: K, value: V) -> Result<(), StorageError>;

    async fn remove(&self, key: &K) -> Result<(), StorageError>;
}

/// 元数据仓储，负责分配 ID
#[tonic::async_trait]
pub trait MetadataRepository: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: MovieId) -> Result<Metadata, StorageError>;

    async fn insert(&self, metadata: NewMetadata) -> Result<Metadata, StorageError>;
}

/// 评分仓储，写入为追加
#[tonic::async_trait]
pub trait RatingRepository: Send + Sync + std::fmt::Debug {
    /// 没有任何评分时返回 `NotFound`
    async fn get(&self, movie_id: MovieId) -> Result<Vec<Rating>, StorageError>;

    async fn put(&self, rating: Rating) -> Result<(), StorageError>;
}
