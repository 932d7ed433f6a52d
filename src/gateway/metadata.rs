use tonic::Status;

use super::{CallContext, Gateway, GatewayError, RetryPolicy};
use crate::model::{Metadata, MovieId};
use crate::pb::{GetMetadataRequest, metadata_service_client::MetadataServiceClient};

/// 元数据服务网关
#[derive(Debug, Clone)]
pub struct MetadataGateway {
    gateway: Gateway,
    retry: RetryPolicy,
}

impl MetadataGateway {
    pub fn new(gateway: Gateway, retry: RetryPolicy) -> Self {
        Self { gateway, retry }
    }

    /// 读取元数据，瞬时错误按重试策略重试
    pub async fn get_metadata(&self, ctx: &CallContext, id: MovieId) -> Result<Metadata, GatewayError> {
        self.gateway
            .call_with_retry(ctx, &self.retry, |channel| async move {
                let response = MetadataServiceClient::new(channel)
                    .get_metadata(ctx.request(GetMetadataRequest { id }))
                    .await?;
                response
                    .into_inner()
                    .metadata
                    .map(Metadata::from)
                    .ok_or_else(|| Status::internal("metadata missing from response"))
            })
            .await
    }

}
