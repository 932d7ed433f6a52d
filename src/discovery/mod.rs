//! Service discovery module
//!
//! This module contains the service registry split into logical components:
//! - `types`: liveness records, instance identity and error types
//! - `memory`: in-process registry guarded by a single reader/writer lock
//! - `grpc_impl`: gRPC server exposing a registry to other processes
//! - `remote`: registry client talking to a remote registry server
//! - `heartbeat`: background task keeping one instance's record fresh

pub mod grpc_impl;
pub mod heartbeat;
pub mod memory;
pub mod remote;
pub mod types;

use std::sync::Arc;

use uuid::Uuid;

pub use grpc_impl::RegistryGrpcService;
pub use heartbeat::{HeartbeatHandle, HeartbeatReporter};
pub use memory::MemoryRegistry;
pub use remote::RemoteRegistry;
pub use types::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_LIVENESS_WINDOW, InstanceInfo, LivenessRecord,
    RegistryError,
};

/// 服务注册表接口
///
/// 同一接口既可由进程内注册表实现，也可由远程注册中心客户端实现；
/// 调用方通过构造函数注入 `SharedRegistry`，从不访问全局实例。
#[tonic::async_trait]
pub trait Registry: Send + Sync + std::fmt::Debug {
    /// 创建或覆盖实例记录，心跳时间为当前时间
    async fn register(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
    ) -> Result<(), RegistryError>;

    /// 删除实例记录；不存在时不报错
    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<(), RegistryError>;

    /// 推送心跳；实例未注册时返回 `NotRegistered`
    async fn report_healthy_state(
        &self,
        instance_id: &str,
        service_name: &str,
    ) -> Result<(), RegistryError>;

    /// 返回所有存活实例的地址；结果为空时返回 `NotFound`。顺序不保证。
    async fn service_addresses(&self, service_name: &str) -> Result<Vec<String>, RegistryError>;
}

pub type SharedRegistry = Arc<dyn Registry>;

/// 为指定服务生成唯一的实例 ID
pub fn generate_instance_id(service_name: &str) -> String {
    format!("{service_name}-{}", Uuid::new_v4())
}

pub(crate) fn validate_identifiers(instance_id: &str, service_name: &str) -> Result<(), RegistryError> {
    if instance_id.is_empty() {
        return Err(RegistryError::InvalidArgument("instance id must not be empty".into()));
    }
    if service_name.is_empty() {
        return Err(RegistryError::InvalidArgument("service name must not be empty".into()));
    }
    Ok(())
}
