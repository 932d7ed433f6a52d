use thiserror::Error;
use tonic::Status;

use crate::gateway::GatewayError;
use crate::storage::StorageError;

// 业务层错误
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidArgument(msg) => Status::invalid_argument(msg),
            ServiceError::NotFound(_) => Status::not_found(err.to_string()),
            ServiceError::Storage(_) => Status::internal(err.to_string()),
            ServiceError::Gateway(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status: Status = ServiceError::NotFound("metadata for movie 1".into()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert_eq!(status.message(), "metadata for movie 1 not found");

        let status: Status = ServiceError::InvalidArgument("bad id".into()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: Status = ServiceError::Storage(StorageError::Backend("down".into())).into();
        assert_eq!(status.code(), tonic::Code::Internal);

        let status: Status =
            ServiceError::Gateway(GatewayError::Rpc(Status::resource_exhausted("busy"))).into();
        assert_eq!(status.code(), tonic::Code::ResourceExhausted);
    }
}
