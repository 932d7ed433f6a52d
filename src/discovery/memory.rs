use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use super::types::{DEFAULT_LIVENESS_WINDOW, LivenessRecord, RegistryError};
use super::{Registry, validate_identifiers};

type ServiceInstances = HashMap<String, LivenessRecord>;

/// 进程内服务注册表（服务名 -> 实例 ID -> 存活记录）
///
/// 所有操作共享同一把读写锁：写操作持有写锁，解析持有读锁。
/// 过期记录不会被清除，只会在解析时被过滤。
#[derive(Debug)]
pub struct MemoryRegistry {
    services: RwLock<HashMap<String, ServiceInstances>>,
    liveness_window: Duration,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LIVENESS_WINDOW)
    }
}

impl MemoryRegistry {
    pub fn new(liveness_window: Duration) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            liveness_window,
        }
    }

    /// 某服务下的记录数量（包括已过期的记录）
    pub async fn instance_count(&self, service_name: &str) -> usize {
        self.services
            .read()
            .await
            .get(service_name)
            .map_or(0, HashMap::len)
    }

    // 获取单个实例记录的快照
    pub async fn record(&self, instance_id: &str, service_name: &str) -> Option<LivenessRecord> {
        self.services
            .read()
            .await
            .get(service_name)
            .and_then(|instances| instances.get(instance_id))
            .cloned()
    }
}

#[tonic::async_trait]
impl Registry for MemoryRegistry {
    async fn register(
        &self,
        instance_id: &str,
        service_name: &str,
        address: &str,
    ) -> Result<(), RegistryError> {
        validate_identifiers(instance_id, service_name)?;
        if address.is_empty() {
            return Err(RegistryError::InvalidArgument("address must not be empty".into()));
        }

        let mut services = self.services.write().await;
        services
            .entry(service_name.to_string())
            .or_default()
            .insert(
                instance_id.to_string(),
                LivenessRecord::new(instance_id, service_name, address),
            );

        tracing::info!(
            service_name = %service_name,
            instance_id = %instance_id,
            address = %address,
            "Registered service instance"
        );
        Ok(())
    }

    async fn deregister(&self, instance_id: &str, service_name: &str) -> Result<(), RegistryError> {
        let mut services = self.services.write().await;
        let Some(instances) = services.get_mut(service_name) else {
            return Ok(());
        };

        if instances.remove(instance_id).is_some() {
            tracing::info!(
                service_name = %service_name,
                instance_id = %instance_id,
                "Deregistered service instance"
            );
        }

        if instances.is_empty() {
            services.remove(service_name);
        }
        Ok(())
    }

    async fn report_healthy_state(
        &self,
        instance_id: &str,
        service_name: &str,
    ) -> Result<(), RegistryError> {
        let mut services = self.services.write().await;
        let record = services
            .get_mut(service_name)
            .and_then(|instances| instances.get_mut(instance_id))
            .ok_or_else(|| RegistryError::not_registered(instance_id, service_name))?;

        record.touch();
        tracing::trace!(
            service_name = %service_name,
            instance_id = %instance_id,
            "Heartbeat received"
        );
        Ok(())
    }

    async fn service_addresses(&self, service_name: &str) -> Result<Vec<String>, RegistryError> {
        let services = self.services.read().await;
        let Some(instances) = services.get(service_name) else {
            return Err(RegistryError::not_found(service_name));
        };

        let now = Instant::now();
        let mut addresses = Vec::with_capacity(instances.len());
        for (instance_id, record) in instances {
            if !record.is_live(now, self.liveness_window) {
                tracing::debug!(
                    service_name = %service_name,
                    instance_id = %instance_id,
                    "Instance is not active, skipping"
                );
                continue;
            }
            addresses.push(record.address.clone());
        }

        if addresses.is_empty() {
            return Err(RegistryError::not_found(service_name));
        }
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_overwrites_address() {
        let registry = MemoryRegistry::default();
        registry.register("m-1", "metadata", "127.0.0.1:1").await.unwrap();
        registry.register("m-1", "metadata", "127.0.0.1:2").await.unwrap();

        let addresses = registry.service_addresses("metadata").await.unwrap();
        assert_eq!(addresses, vec!["127.0.0.1:2".to_string()]);
        assert_eq!(registry.instance_count("metadata").await, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_identifiers() {
        let registry = MemoryRegistry::default();
        assert!(matches!(
            registry.register("", "metadata", "127.0.0.1:1").await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.register("m-1", "", "127.0.0.1:1").await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.register("m-1", "metadata", "").await,
            Err(RegistryError::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_record_is_kept_but_not_resolved() {
        let registry = MemoryRegistry::default();
        registry.register("r-1", "rating", "127.0.0.1:8082").await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        let err = registry.service_addresses("rating").await.unwrap_err();
        assert!(err.is_not_found());
        // 过期记录仍然存在，只是不可见
        assert_eq!(registry.instance_count("rating").await, 1);

        // 心跳恢复后重新可见
        registry.report_healthy_state("r-1", "rating").await.unwrap();
        assert_eq!(
            registry.service_addresses("rating").await.unwrap(),
            vec!["127.0.0.1:8082".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deregister_unknown_service_is_noop() {
        let registry = MemoryRegistry::default();
        registry.deregister("x", "unknown").await.unwrap();
        assert_eq!(registry.instance_count("unknown").await, 0);
    }
}
