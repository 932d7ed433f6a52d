use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use super::types::RegistryError;
use super::Registry;
use crate::pb::{
    DeregisterRequest, RegisterRequest, ReportHealthyStateRequest, ServiceAddressesRequest,
    registry_service_client::RegistryServiceClient,
};

/// 远程注册中心客户端
///
/// 通过 gRPC 调用注册中心进程，错误码映射回 `RegistryError`。
/// 通道延迟建立，注册中心暂时不可用不会阻止本进程启动。
#[derive(Debug, Clone)]
pub struct RemoteRegistry {
    client: RegistryServiceClient<Channel>,
}

impl RemoteRegistry {
    pub fn connect_lazy(
        address: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let endpoint = Endpoint::from_shared(crate::gateway::endpoint_uri(address))?
            .connect_timeout(connect_timeout)
            .timeout(request_timeout);

        Ok(Self {
            client: RegistryServiceClient::new(endpoint.connect_lazy()),
        })
    }

    fn map_status(status: Status, instance_id: &str, service_name: &str) -> RegistryError {
        match status.code() {
            Code::FailedPrecondition => RegistryError::not_registered(instance_id, service_name),
            Code::NotFound => RegistryError::not_found(service_name),
            Code::InvalidArgument => RegistryError::InvalidArgument(status.message().to_string()),
            _ => RegistryError::Rpc(status),
        }
    }
}

#[tonic::async_trait]
impl Registry for RemoteRegistry {
    async fn register(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
    ) -> Result<(), RegistryError> {
        let request = RegisterRequest {
            instance_id: instance_id.to_string(),
            service_name: service_name.to_string(),
            address: address.to_string(),
        };
        self.client
            .clone()
            .register(request)
            .await
            .map_err(|s| Self::map_status(s, instance_id, service_name))?;
        Ok(())
    }

    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<(), RegistryError> {
        let request = DeregisterRequest {
            instance_id: instance_id.to_string(),
            service_name: service_name.to_string(),
        };
        self.client
            .clone()
            .deregister(request)
            .await
            .map_err(|s| Self::map_status(s, instance_id, service_name))?;
        Ok(())
    }

    async fn report_healthy_state(
        &self,
        instance_id: &str,
        service_name: &str,
    ) -> Result<(), RegistryError> {
        let request = ReportHealthyStateRequest {
            instance_id: instance_id.to_string(),
            service_name: service_name.to_string(),
        };
        self.client
            .clone()
            .report_healthy_state(request)
            .await
            .map_err(|s| Self::map_status(s, instance_id, service_name))?;
        Ok(())
    }

    async fn service_addresses(&self, service_name: &str) -> Result<Vec<String>, RegistryError> {
        let request = ServiceAddressesRequest {
            service_name: service_name.to_string(),
        };
        let response = self
            .client
            .clone()
            .service_addresses(request)
            .await
            .map_err(|s| Self::map_status(s, "", service_name))?;

        let addresses = response.into_inner().addresses;
        if addresses.is_empty() {
            return Err(RegistryError::not_found(service_name));
        }
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_map_back_to_registry_errors() {
        let err = RemoteRegistry::map_status(Status::failed_precondition("x"), "r-1", "rating");
        assert!(err.is_not_registered());

        let err = RemoteRegistry::map_status(Status::not_found("x"), "", "rating");
        assert!(err.is_not_found());

        let err = RemoteRegistry::map_status(Status::unavailable("down"), "", "rating");
        assert!(matches!(err, RegistryError::Rpc(s) if s.code() == Code::Unavailable));
    }
}
