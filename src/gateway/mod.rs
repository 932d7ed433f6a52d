//! Resolver-backed gateways
//!
//! Every call resolves the target service through the registry, opens a
//! short-lived channel to one live address and releases it when the call ends.
//! Typed gateways for the metadata and rating services wrap reads in a
//! [`RetryPolicy`].

pub mod context;
pub mod error;
pub mod metadata;
pub mod rating;
pub mod retry;
pub mod selector;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tonic::Status;
use tonic::transport::{Channel, Endpoint};

use crate::discovery::{RegistryError, SharedRegistry};

pub use context::CallContext;
pub use error::GatewayError;
pub use metadata::MetadataGateway;
pub use rating::RatingGateway;
pub use retry::{Backoff, Classification, RetryPolicy, classify_transient};
pub use selector::{AddressSelector, FirstAddress, RandomAddress, RoundRobin, SelectionPolicy};

/// 将 `host:port` 转换为可连接的 URI
pub fn endpoint_uri(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

/// 单个远程服务的网关
#[derive(Debug, Clone)]
pub struct Gateway {
    service_name: String,
    registry: SharedRegistry,
    selector: Arc<dyn AddressSelector>,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl Gateway {
    pub fn new(service_name: &str, registry: SharedRegistry) -> Self {
        Self {
            service_name: service_name.to_string(),
            registry,
            selector: Arc::new(FirstAddress),
            connect_timeout: Duration::from_secs(2),
            request_timeout: None,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn AddressSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 单次尝试的超时，超时按 deadline-exceeded 处理
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// 解析一个存活地址
    pub async fn resolve(&self) -> Result<String, GatewayError> {
        let addresses = self.registry.service_addresses(&self.service_name).await?;
        self.selector
            .select(&addresses)
            .ok_or_else(|| RegistryError::not_found(&self.service_name).into())
    }

    /// 解析地址并建立新连接
    pub async fn connect(&self) -> Result<Channel, GatewayError> {
        let address = self.resolve().await?;
        tracing::debug!(
            service_name = %self.service_name,
            address = %address,
            "Opening connection"
        );

        let endpoint = Endpoint::from_shared(endpoint_uri(&address))
            .map_err(|source| GatewayError::Connect {
                address: address.clone(),
                source,
            })?
            .connect_timeout(self.connect_timeout);

        endpoint
            .connect()
            .await
            .map_err(|source| GatewayError::Connect { address, source })
    }

    /// 执行一次远程调用
    ///
    /// 连接由 `op` 独占，调用结束（成功、失败或取消）时随之释放。
    pub async fn call<T, F, Fut>(&self, ctx: &CallContext, op: F) -> Result<T, GatewayError>
    where
        F: FnOnce(Channel) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let attempt = async {
            let channel = self.connect().await?;
            let outcome = match self.request_timeout {
                Some(timeout) => tokio::time::timeout(timeout, op(channel))
                    .await
                    .unwrap_or_else(|_| Err(Status::deadline_exceeded("request timed out"))),
                None => op(channel).await,
            };
            outcome.map_err(GatewayError::from)
        };

        tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            outcome = attempt => outcome,
        }
    }

    /// 按重试策略执行调用，每次尝试都重新解析地址
    pub async fn call_with_retry<T, F, Fut>(
        &self,
        ctx: &CallContext,
        policy: &RetryPolicy,
        op: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn(Channel) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        policy
            .run(ctx, |attempt| {
                tracing::trace!(
                    service_name = %self.service_name,
                    attempt = attempt,
                    "Gateway attempt"
                );
                self.call(ctx, &op)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{MemoryRegistry, Registry};

    #[test]
    fn test_endpoint_uri() {
        assert_eq!(endpoint_uri("localhost:8082"), "http://localhost:8082");
        assert_eq!(endpoint_uri("http://localhost:8082"), "http://localhost:8082");
        assert_eq!(endpoint_uri("https://rating:443"), "https://rating:443");
    }

    #[tokio::test]
    async fn test_resolve_without_instances_is_not_found() {
        let registry: SharedRegistry = Arc::new(MemoryRegistry::default());
        let gateway = Gateway::new("rating", registry);

        let err = gateway.resolve().await.unwrap_err();
        assert!(err.is_no_live_instance());
    }

    #[tokio::test]
    async fn test_call_fails_fast_without_instances() {
        let registry: SharedRegistry = Arc::new(MemoryRegistry::default());
        let gateway = Gateway::new("rating", registry);

        let mut invoked = false;
        let result: Result<(), _> = gateway
            .call(&CallContext::new(), |_channel| {
                invoked = true;
                async { Ok(()) }
            })
            .await;

        assert!(result.unwrap_err().is_no_live_instance());
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported_with_address() {
        let registry = Arc::new(MemoryRegistry::default());
        // 端口 1 上不会有服务监听
        registry.register("r-1", "rating", "127.0.0.1:1").await.unwrap();

        let gateway = Gateway::new("rating", registry).with_connect_timeout(Duration::from_millis(200));
        let err = gateway.connect().await.unwrap_err();
        assert!(matches!(err, GatewayError::Connect { ref address, .. } if address == "127.0.0.1:1"));
        assert_eq!(classify_transient(&err), Classification::Retriable);
    }
}
