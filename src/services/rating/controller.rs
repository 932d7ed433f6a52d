use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{MovieId, Rating};
use crate::services::ServiceError;
use crate::storage::{KeyValueStore, RatingRepository};

/// 评分业务逻辑
///
/// 聚合评分为算术平均值，计算结果写入缓存；新评分写入后使该电影的缓存失效。
/// 每部电影维护一个写入版本号，读取期间发生写入时，刚写入缓存的旧平均值会被撤销。
#[derive(Debug, Clone)]
pub struct RatingController {
    repository: Arc<dyn RatingRepository>,
    cache: Arc<dyn KeyValueStore<MovieId, f64>>,
    versions: Arc<DashMap<MovieId, u64>>,
}

impl RatingController {
    pub fn new(
        repository: Arc<dyn RatingRepository>,
        cache: Arc<dyn KeyValueStore<MovieId, f64>>,
    ) -> Self {
        Self {
            repository,
            cache,
            versions: Arc::new(DashMap::new()),
        }
    }

    fn version(&self, movie_id: MovieId) -> u64 {
        self.versions.get(&movie_id).map_or(0, |v| *v)
    }

    pub async fn get_aggregated_rating(&self, movie_id: MovieId) -> Result<f64, ServiceError> {
        match self.cache.get(&movie_id).await {
            Ok(rating) => return Ok(rating),
            Err(e) if !e.is_not_found() => {
                tracing::warn!(movie_id = movie_id, error = %e, "Rating cache lookup failed");
            }
            Err(_) => {}
        }

        let version = self.version(movie_id);
        let ratings = self.repository.get(movie_id).await.map_err(|e| {
            if e.is_not_found() {
                ServiceError::NotFound(format!("ratings for movie {movie_id}"))
            } else {
                e.into()
            }
        })?;

        let average = average(&ratings)
            .ok_or_else(|| ServiceError::NotFound(format!("ratings for movie {movie_id}")))?;

        if let Err(e) = self.cache.put(movie_id, average).await {
            tracing::warn!(movie_id = movie_id, error = %e, "Failed to cache aggregated rating");
        }
        // 写入版本在读取期间变化，缓存值可能已过时
        if self.version(movie_id) != version {
            tracing::debug!(movie_id = movie_id, "Rating changed during aggregation, dropping cached value");
            if let Err(e) = self.cache.remove(&movie_id).await {
                tracing::warn!(movie_id = movie_id, error = %e, "Failed to invalidate rating cache");
            }
        }

        tracing::debug!(movie_id = movie_id, count = ratings.len(), average = average, "Aggregated rating computed");
        Ok(average)
    }

    pub async fn put_rating(&self, rating: Rating) -> Result<(), ServiceError> {
        self.repository.put(rating).await?;
        *self.versions.entry(rating.movie_id).or_insert(0) += 1;
        if let Err(e) = self.cache.remove(&rating.movie_id).await {
            tracing::warn!(movie_id = rating.movie_id, error = %e, "Failed to invalidate rating cache");
        }

        tracing::info!(movie_id = rating.movie_id, rating = rating.value, "Rating stored");
        Ok(())
    }
}

fn average(ratings: &[Rating]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: f64 = ratings.iter().map(|r| f64::from(r.value)).sum();
    Some(sum / ratings.len() as f64)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::storage::{MemoryRatingRepository, StorageError, TtlCache};

    fn controller_with_ttl(ttl: Duration) -> RatingController {
        RatingController::new(
            Arc::new(MemoryRatingRepository::default()),
            Arc::new(TtlCache::<MovieId, f64>::new(ttl)),
        )
    }

    #[test]
    fn test_average() {
        assert_eq!(average(&[]), None);
        let ratings = [
            Rating { movie_id: 1, value: 4 },
            Rating { movie_id: 1, value: 5 },
        ];
        assert_eq!(average(&ratings), Some(4.5));
    }

    #[tokio::test]
    async fn test_no_ratings_is_not_found() {
        let controller = controller_with_ttl(Duration::from_secs(60));
        let err = controller.get_aggregated_rating(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_average_over_all_ratings() {
        let controller = controller_with_ttl(Duration::from_secs(60));
        for value in [4, 5] {
            controller.put_rating(Rating { movie_id: 1, value }).await.unwrap();
        }
        assert_eq!(controller.get_aggregated_rating(1).await.unwrap(), 4.5);
    }

    #[tokio::test]
    async fn test_put_invalidates_cached_average() {
        let controller = controller_with_ttl(Duration::from_secs(60));
        controller.put_rating(Rating { movie_id: 3, value: 2 }).await.unwrap();
        assert_eq!(controller.get_aggregated_rating(3).await.unwrap(), 2.0);

        controller.put_rating(Rating { movie_id: 3, value: 4 }).await.unwrap();
        assert_eq!(controller.get_aggregated_rating(3).await.unwrap(), 3.0);
    }

    /// 下一次读取取到数据后暂停，等待放行
    #[derive(Debug, Default)]
    struct PausingRepository {
        inner: MemoryRatingRepository,
        pause_next_get: AtomicBool,
        reading: Notify,
        resume: Notify,
    }

    #[tonic::async_trait]
    impl RatingRepository for PausingRepository {
        async fn get(&self, movie_id: MovieId) -> Result<Vec<Rating>, StorageError> {
            let ratings = self.inner.get(movie_id).await;
            if self.pause_next_get.swap(false, Ordering::SeqCst) {
                self.reading.notify_one();
                self.resume.notified().await;
            }
            ratings
        }

        async fn put(&self, rating: Rating) -> Result<(), StorageError> {
            self.inner.put(rating).await
        }
    }

    #[tokio::test]
    async fn test_write_during_aggregation_does_not_leave_stale_cache() {
        let repository = Arc::new(PausingRepository::default());
        let controller = RatingController::new(
            repository.clone(),
            Arc::new(TtlCache::<MovieId, f64>::new(Duration::from_secs(60))),
        );
        controller.put_rating(Rating { movie_id: 9, value: 2 }).await.unwrap();

        repository.pause_next_get.store(true, Ordering::SeqCst);
        let reader = tokio::spawn({
            let controller = controller.clone();
            async move { controller.get_aggregated_rating(9).await }
        });

        // 读取已取到旧数据，此时写入新评分
        repository.reading.notified().await;
        controller.put_rating(Rating { movie_id: 9, value: 4 }).await.unwrap();
        repository.resume.notify_one();

        assert_eq!(reader.await.unwrap().unwrap(), 2.0);
        assert_eq!(controller.get_aggregated_rating(9).await.unwrap(), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_average_is_served_within_ttl() {
        let repository = Arc::new(MemoryRatingRepository::default());
        let controller = RatingController::new(
            repository.clone(),
            Arc::new(TtlCache::<MovieId, f64>::new(Duration::from_secs(60))),
        );
        controller.put_rating(Rating { movie_id: 5, value: 1 }).await.unwrap();
        assert_eq!(controller.get_aggregated_rating(5).await.unwrap(), 1.0);

        // 绕过控制器直接写仓储，缓存不会失效
        repository.put(Rating { movie_id: 5, value: 5 }).await.unwrap();
        assert_eq!(controller.get_aggregated_rating(5).await.unwrap(), 1.0);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(controller.get_aggregated_rating(5).await.unwrap(), 3.0);
    }
}
