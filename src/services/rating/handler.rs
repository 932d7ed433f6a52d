use tonic::{Request, Response, Status};

use super::RatingController;
use crate::model::{MAX_RATING, MIN_RATING, Rating};
use crate::pb::{
    GetAggregatedRatingRequest, GetAggregatedRatingResponse, PutRatingRequest, PutRatingResponse,
    rating_service_server::RatingService,
};

/// 校验评分写入请求，评分服务与电影服务共用
pub fn validate_put_rating(request: &PutRatingRequest) -> Result<Rating, Status> {
    if request.movie_id <= 0 {
        return Err(Status::invalid_argument("movie_id must be positive"));
    }
    if !(MIN_RATING..=MAX_RATING).contains(&request.rating) {
        return Err(Status::invalid_argument(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(Rating {
        movie_id: request.movie_id,
        value: request.rating,
    })
}

/// 评分服务的 gRPC 入口
#[derive(Debug, Clone)]
pub struct RatingHandler {
    controller: RatingController,
}

impl RatingHandler {
    pub fn new(controller: RatingController) -> Self {
        Self { controller }
    }
}

#[tonic::async_trait]
impl RatingService for RatingHandler {
    async fn get_aggregated_rating(
        &self,
        request: Request<GetAggregatedRatingRequest>,
    ) -> Result<Response<GetAggregatedRatingResponse>, Status> {
        let movie_id = request.into_inner().movie_id;
        if movie_id < 0 {
            return Err(Status::invalid_argument("movie_id must not be negative"));
        }

        let rating = self.controller.get_aggregated_rating(movie_id).await?;
        Ok(Response::new(GetAggregatedRatingResponse { rating }))
    }

    async fn put_rating(
        &self,
        request: Request<PutRatingRequest>,
    ) -> Result<Response<PutRatingResponse>, Status> {
        let rating = validate_put_rating(request.get_ref())?;
        self.controller.put_rating(rating).await?;
        Ok(Response::new(PutRatingResponse {}))
    }
}
