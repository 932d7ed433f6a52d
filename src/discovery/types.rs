use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tonic::Status;

/// 默认存活窗口：超过该时长未收到心跳的实例不再被解析
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(5);

/// 默认心跳间隔
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

// 单个服务实例的存活记录
#[derive(Debug, Clone)]
pub struct LivenessRecord {
    pub instance_id: String,
    pub service_name: String,
    pub address: String,
    pub last_heartbeat: Instant,
}

impl LivenessRecord {
    pub fn new(instance_id: &str, service_name: &str, address: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            service_name: service_name.to_string(),
            address: address.to_string(),
            last_heartbeat: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// 存活性是派生属性，每次解析时重新计算
    pub fn is_live(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) < window
    }
}

/// 本进程对外注册的实例身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub service_name: String,
    pub address: String,
}

impl InstanceInfo {
    /// 生成新的实例 ID，每次进程启动都不同
    pub fn generate(service_name: &str, address: &str) -> Self {
        Self {
            instance_id: super::generate_instance_id(service_name),
            service_name: service_name.to_string(),
            address: address.to_string(),
        }
    }
}

/// 注册中心错误类型
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("instance {instance_id} of service {service_name} is not registered yet")]
    NotRegistered {
        instance_id: String,
        service_name: String,
    },

    #[error("no service addresses found for {service_name}")]
    NotFound { service_name: String },

    #[error("invalid registry argument: {0}")]
    InvalidArgument(String),

    #[error("registry transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("registry rpc error: {0}")]
    Rpc(#[from] Status),
}

impl RegistryError {
    pub fn not_registered(instance_id: &str, service_name: &str) -> Self {
        Self::NotRegistered {
            instance_id: instance_id.to_string(),
            service_name: service_name.to_string(),
        }
    }

    pub fn not_found(service_name: &str) -> Self {
        Self::NotFound {
            service_name: service_name.to_string(),
        }
    }

    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<RegistryError> for Status {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotRegistered { .. } => Status::failed_precondition(err.to_string()),
            RegistryError::NotFound { .. } => Status::not_found(err.to_string()),
            RegistryError::InvalidArgument(msg) => Status::invalid_argument(msg),
            RegistryError::Transport(e) => Status::unavailable(e.to_string()),
            RegistryError::Rpc(status) => status,
        }
    }
}
