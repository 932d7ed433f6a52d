use tonic::{Request, Response, Status};

use super::MetadataController;
use crate::model::NewMetadata;
use crate::pb::{
    GetMetadataRequest, GetMetadataResponse, PutMetadataRequest, PutMetadataResponse,
    metadata_service_server::MetadataService,
};

/// 元数据服务的 gRPC 入口
#[derive(Debug, Clone)]
pub struct MetadataHandler {
    controller: MetadataController,
}

impl MetadataHandler {
    pub fn new(controller: MetadataController) -> Self {
        Self { controller }
    }
}

#[tonic::async_trait]
impl MetadataService for MetadataHandler {
    async fn get_metadata(
        &self,
        request: Request<GetMetadataRequest>,
    ) -> Result<Response<GetMetadataResponse>, Status> {
        let id = request.into_inner().id;
        if id <= 0 {
            return Err(Status::invalid_argument("id must be positive"));
        }

        tracing::debug!(movie_id = id, "GetMetadata");
        let metadata = self.controller.get(id).await?;
        Ok(Response::new(GetMetadataResponse {
            metadata: Some(metadata.into()),
        }))
    }

    async fn put_metadata(
        &self,
        request: Request<PutMetadataRequest>,
    ) -> Result<Response<PutMetadataResponse>, Status> {
        let metadata: NewMetadata = request.into_inner().into();
        if metadata.title.trim().is_empty() {
            return Err(Status::invalid_argument("title must not be empty"));
        }
        if metadata.year <= 0 {
            return Err(Status::invalid_argument("year must be positive"));
        }

        let stored = self.controller.put(metadata).await?;
        Ok(Response::new(PutMetadataResponse { id: stored.id }))
    }
}
