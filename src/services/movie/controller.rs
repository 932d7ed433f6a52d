use std::fmt::Debug;
use std::sync::Arc;

use crate::gateway::{CallContext, GatewayError, MetadataGateway, RatingGateway};
use crate::model::{Metadata, MovieDetails, MovieId, Rating};
use crate::services::ServiceError;

/// 电影服务依赖的元数据来源
#[tonic::async_trait]
pub trait MetadataSource: Send + Sync + Debug {
    async fn get_metadata(&self, ctx: &CallContext, id: MovieId) -> Result<Metadata, GatewayError>;
}

/// 电影服务依赖的评分来源
#[tonic::async_trait]
pub trait RatingSource: Send + Sync + Debug {
    async fn get_aggregated_rating(&self, ctx: &CallContext, movie_id: MovieId) -> Result<f64, GatewayError>;

    async fn put_rating(&self, ctx: &CallContext, rating: Rating) -> Result<(), GatewayError>;
}

#[tonic::async_trait]
impl MetadataSource for MetadataGateway {
    async fn get_metadata(&self, ctx: &CallContext, id: MovieId) -> Result<Metadata, GatewayError> {
        MetadataGateway::get_metadata(self, ctx, id).await
    }
}

#[tonic::async_trait]
impl RatingSource for RatingGateway {
    async fn get_aggregated_rating(&self, ctx: &CallContext, movie_id: MovieId) -> Result<f64, GatewayError> {
        RatingGateway::get_aggregated_rating(self, ctx, movie_id).await
    }

    async fn put_rating(&self, ctx: &CallContext, rating: Rating) -> Result<(), GatewayError> {
        RatingGateway::put_rating(self, ctx, rating.movie_id, rating.value).await
    }
}

/// 电影详情聚合
#[derive(Debug, Clone)]
pub struct MovieController {
    metadata: Arc<dyn MetadataSource>,
    rating: Arc<dyn RatingSource>,
}

impl MovieController {
    pub fn new(metadata: Arc<dyn MetadataSource>, rating: Arc<dyn RatingSource>) -> Self {
        Self { metadata, rating }
    }

    /// 先取元数据再取评分；没有评分时返回不带评分的详情
    pub async fn get(&self, ctx: &CallContext, movie_id: MovieId) -> Result<MovieDetails, ServiceError> {
        let metadata = self
            .metadata
            .get_metadata(ctx, movie_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ServiceError::NotFound(format!("movie {movie_id}"))
                } else {
                    tracing::warn!(movie_id = movie_id, error = %e, "Metadata lookup failed");
                    e.into()
                }
            })?;

        let rating = match self.rating.get_aggregated_rating(ctx, movie_id).await {
            Ok(rating) => Some(rating),
            Err(e) if e.is_not_found() => {
                tracing::debug!(movie_id = movie_id, "Movie has no ratings yet");
                None
            }
            Err(e) => {
                tracing::warn!(movie_id = movie_id, error = %e, "Rating lookup failed");
                return Err(e.into());
            }
        };

        Ok(MovieDetails { rating, metadata })
    }

    /// 转发评分写入，不重试
    pub async fn put_rating(&self, ctx: &CallContext, rating: Rating) -> Result<(), ServiceError> {
        self.rating.put_rating(ctx, rating).await?;
        Ok(())
    }
}
