use tonic::{Request, Response, Status};

use super::MovieController;
use crate::gateway::CallContext;
use crate::pb::{
    GetMovieDetailsRequest, GetMovieDetailsResponse, PutRatingRequest, PutRatingResponse,
    movie_service_server::MovieService,
};
use crate::services::rating::handler::validate_put_rating;

/// 电影服务的 gRPC 入口
///
/// 调用方的 `grpc-timeout` 会传递给所有下游调用。
#[derive(Debug, Clone)]
pub struct MovieHandler {
    controller: MovieController,
}

impl MovieHandler {
    pub fn new(controller: MovieController) -> Self {
        Self { controller }
    }
}

#[tonic::async_trait]
impl MovieService for MovieHandler {
    async fn get_movie_details(
        &self,
        request: Request<GetMovieDetailsRequest>,
    ) -> Result<Response<GetMovieDetailsResponse>, Status> {
        let ctx = CallContext::from_request(&request);
        let movie_id = request.into_inner().movie_id;
        if movie_id <= 0 {
            return Err(Status::invalid_argument("movie_id must be positive"));
        }

        let details = self.controller.get(&ctx, movie_id).await?;
        Ok(Response::new(GetMovieDetailsResponse {
            movie_details: Some(details.into()),
        }))
    }

    async fn put_rating(
        &self,
        request: Request<PutRatingRequest>,
    ) -> Result<Response<PutRatingResponse>, Status> {
        let ctx = CallContext::from_request(&request);
        let rating = validate_put_rating(request.get_ref())?;

        self.controller.put_rating(&ctx, rating).await?;
        Ok(Response::new(PutRatingResponse {}))
    }
}
