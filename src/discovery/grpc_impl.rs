use tonic::{Request, Response, Status};

use super::SharedRegistry;
use crate::pb::{
    DeregisterRequest, DeregisterResponse, RegisterRequest, RegisterResponse,
    ReportHealthyStateRequest, ReportHealthyStateResponse, ServiceAddressesRequest,
    ServiceAddressesResponse,
    registry_service_server::{RegistryService, RegistryServiceServer},
};

// 将注册表以 gRPC 服务的形式暴露给其他进程
#[derive(Debug, Clone)]
pub struct RegistryGrpcService {
    registry: SharedRegistry,
}

impl RegistryGrpcService {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn into_server(self) -> RegistryServiceServer<Self> {
        RegistryServiceServer::new(self)
    }
}

// 为结构体实现 gRPC 服务 trait
#[tonic::async_trait]
impl RegistryService for RegistryGrpcService {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        self.registry
            .register(&req.instance_id, &req.service_name, &req.address)
            .await?;
        Ok(Response::new(RegisterResponse {}))
    }

    async fn deregister(
        &self,
        request: Request<DeregisterRequest>,
    ) -> Result<Response<DeregisterResponse>, Status> {
        let req = request.into_inner();
        self.registry
            .deregister(&req.instance_id, &req.service_name)
            .await?;
        Ok(Response::new(DeregisterResponse {}))
    }

    async fn report_healthy_state(
        &self,
        request: Request<ReportHealthyStateRequest>,
    ) -> Result<Response<ReportHealthyStateResponse>, Status> {
        let req = request.into_inner();
        if let Err(e) = self
            .registry
            .report_healthy_state(&req.instance_id, &req.service_name)
            .await
        {
            tracing::warn!(
                service_name = %req.service_name,
                instance_id = %req.instance_id,
                error = %e,
                "Rejected heartbeat"
            );
            return Err(e.into());
        }
        Ok(Response::new(ReportHealthyStateResponse {}))
    }

    async fn service_addresses(
        &self,
        request: Request<ServiceAddressesRequest>,
    ) -> Result<Response<ServiceAddressesResponse>, Status> {
        let req = request.into_inner();
        let addresses = self.registry.service_addresses(&req.service_name).await?;
        Ok(Response::new(ServiceAddressesResponse { addresses }))
    }
}
