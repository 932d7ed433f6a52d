use super::{CallContext, Gateway, GatewayError, RetryPolicy};
use crate::model::MovieId;
use crate::pb::{
    GetAggregatedRatingRequest, PutRatingRequest, rating_service_client::RatingServiceClient,
};

/// 评分服务网关
#[derive(Debug, Clone)]
pub struct RatingGateway {
    gateway: Gateway,
    retry: RetryPolicy,
}

impl RatingGateway {
    pub fn new(gateway: Gateway, retry: RetryPolicy) -> Self {
        Self { gateway, retry }
    }

    pub async fn get_aggregated_rating(
        &self,
        ctx: &CallContext,
        movie_id: MovieId,
    ) -> Result<f64, GatewayError> {
        self.gateway
            .call_with_retry(ctx, &self.retry, |channel| async move {
                let response = RatingServiceClient::new(channel)
                    .get_aggregated_rating(ctx.request(GetAggregatedRatingRequest { movie_id }))
                    .await?;
                Ok(response.into_inner().rating)
            })
            .await
    }

    // 追加评分不是幂等操作，不做重试
    pub async fn put_rating(&self, ctx: &CallContext, movie_id: MovieId, rating: i32) -> Result<(), GatewayError> {
        self.gateway
            .call(ctx, |channel| async move {
                RatingServiceClient::new(channel)
                    .put_rating(ctx.request(PutRatingRequest { movie_id, rating }))
                    .await?;
                Ok(())
            })
            .await
    }
}
