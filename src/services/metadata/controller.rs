use std::sync::Arc;

use crate::model::{Metadata, MovieId, NewMetadata};
use crate::services::ServiceError;
use crate::storage::{KeyValueStore, MetadataRepository};

/// 元数据业务逻辑：先查缓存，未命中再查仓储并回填
#[derive(Debug, Clone)]
pub struct MetadataController {
    repository: Arc<dyn MetadataRepository>,
    cache: Arc<dyn KeyValueStore<MovieId, Metadata>>,
}

impl MetadataController {
    pub fn new(
        repository: Arc<dyn MetadataRepository>,
        cache: Arc<dyn KeyValueStore<MovieId, Metadata>>,
    ) -> Self {
        Self { repository, cache }
    }

    pub async fn get(&self, id: MovieId) -> Result<Metadata, ServiceError> {
        match self.cache.get(&id).await {
            Ok(metadata) => {
                tracing::debug!(movie_id = id, "Metadata served from cache");
                return Ok(metadata);
            }
            Err(e) if !e.is_not_found() => {
                tracing::warn!(movie_id = id, error = %e, "Metadata cache lookup failed");
            }
            Err(_) => {}
        }

        let metadata = self.repository.get(id).await.map_err(|e| {
            if e.is_not_found() {
                ServiceError::NotFound(format!("metadata for movie {id}"))
            } else {
                e.into()
            }
        })?;

        // 回填失败不影响本次读取
        if let Err(e) = self.cache.put(id, metadata.clone()).await {
            tracing::warn!(movie_id = id, error = %e, "Failed to back-fill metadata cache");
        }

        Ok(metadata)
    }

    pub async fn put(&self, metadata: NewMetadata) -> Result<Metadata, ServiceError> {
        let metadata = self.repository.insert(metadata).await?;
        if let Err(e) = self.cache.put(metadata.id, metadata.clone()).await {
            tracing::warn!(movie_id = metadata.id, error = %e, "Failed to populate metadata cache");
        }

        tracing::info!(movie_id = metadata.id, title = %metadata.title, "Metadata stored");
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryMetadataRepository, TtlCache};

    fn new_metadata(title: &str) -> NewMetadata {
        NewMetadata {
            title: title.to_string(),
            year: 1999,
            description: "a film".to_string(),
            director: "someone".to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let controller = MetadataController::new(
            Arc::new(MemoryMetadataRepository::default()),
            Arc::new(TtlCache::<MovieId, Metadata>::default()),
        );

        let stored = controller.put(new_metadata("The Matrix")).await.unwrap();
        assert_eq!(stored.id, 1);

        let fetched = controller.get(stored.id).await.unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn test_missing_metadata_is_not_found() {
        let controller = MetadataController::new(
            Arc::new(MemoryMetadataRepository::default()),
            Arc::new(TtlCache::<MovieId, Metadata>::default()),
        );

        let err = controller.get(42).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_repository() {
        let cache: Arc<TtlCache<MovieId, Metadata>> = Arc::new(TtlCache::default());
        let cached = new_metadata("Cached").with_id(7);
        cache.put(7, cached.clone()).await.unwrap();

        // 仓储为空，只能从缓存命中
        let controller = MetadataController::new(Arc::new(MemoryMetadataRepository::default()), cache);
        assert_eq!(controller.get(7).await.unwrap(), cached);
    }

    #[tokio::test]
    async fn test_repository_read_back_fills_cache() {
        let repository = Arc::new(MemoryMetadataRepository::default());
        let stored = repository.insert(new_metadata("Heat")).await.unwrap();

        let cache: Arc<TtlCache<MovieId, Metadata>> = Arc::new(TtlCache::default());
        let controller = MetadataController::new(repository, cache.clone());

        assert!(cache.get(&stored.id).await.is_err());
        controller.get(stored.id).await.unwrap();
        assert_eq!(cache.get(&stored.id).await.unwrap(), stored);
    }
}
