use thiserror::Error;
use tonic::Status;

use crate::discovery::RegistryError;

/// 网关调用错误类型
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("service resolution failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: tonic::transport::Error,
    },

    #[error("rpc failed: {0}")]
    Rpc(#[from] Status),

    #[error("call cancelled by caller")]
    Cancelled,

    #[error("caller deadline exceeded")]
    DeadlineExceeded,

    #[error("call failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<GatewayError>,
    },
}

impl GatewayError {
    /// 远端返回的状态码（仅 `Rpc` 变体）
    pub fn status_code(&self) -> Option<tonic::Code> {
        match self {
            Self::Rpc(status) => Some(status.code()),
            _ => None,
        }
    }

    /// 远端是否返回 not-found；注册表解析不到实例见 `is_no_live_instance`
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Rpc(status) => status.code() == tonic::Code::NotFound,
            _ => false,
        }
    }

    pub fn is_no_live_instance(&self) -> bool {
        matches!(self, Self::Registry(e) if e.is_not_found())
    }
}

impl From<GatewayError> for Status {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rpc(status) => status,
            GatewayError::Cancelled => Status::cancelled(err.to_string()),
            GatewayError::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
            GatewayError::Registry(_)
            | GatewayError::Connect { .. }
            | GatewayError::RetriesExhausted { .. } => Status::unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::RetriesExhausted {
            attempts: 5,
            last: Box::new(GatewayError::Rpc(Status::unavailable("down"))),
        };
        assert!(err.to_string().starts_with("call failed after 5 attempts"));
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_status_conversion_keeps_remote_code() {
        let status: Status = GatewayError::Rpc(Status::invalid_argument("bad id")).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: Status = GatewayError::Registry(RegistryError::not_found("rating")).into();
        assert_eq!(status.code(), tonic::Code::Unavailable);

        let status: Status = GatewayError::Cancelled.into();
        assert_eq!(status.code(), tonic::Code::Cancelled);
    }
}
