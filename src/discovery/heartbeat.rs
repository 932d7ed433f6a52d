use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::types::{DEFAULT_HEARTBEAT_INTERVAL, InstanceInfo, RegistryError};
use super::SharedRegistry;

pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// 心跳上报器
///
/// 启动时注册一次，之后按固定间隔上报心跳；上报失败只记录日志，不会终止循环。
/// 停止时恰好注销一次。
#[derive(Debug)]
pub struct HeartbeatReporter {
    registry: SharedRegistry,
    instance: InstanceInfo,
    interval: Duration,
    reregister_on_missing: bool,
}

impl HeartbeatReporter {
    pub fn new(registry: SharedRegistry, instance: InstanceInfo) -> Self {
        Self {
            registry,
            instance,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            reregister_on_missing: false,
        }
    }

    /// 心跳间隔，不低于 [`MIN_HEARTBEAT_INTERVAL`]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_HEARTBEAT_INTERVAL);
        self
    }

    /// 心跳返回 `NotRegistered` 时是否自动重新注册（默认关闭）
    pub fn with_reregister_on_missing(mut self, enabled: bool) -> Self {
        self.reregister_on_missing = enabled;
        self
    }

    /// 注册实例并启动后台心跳任务
    ///
    /// `shutdown` 触发或调用 [`HeartbeatHandle::shutdown`] 都会结束循环并注销实例。
    pub async fn start(self, shutdown: &CancellationToken) -> Result<HeartbeatHandle, RegistryError> {
        self.registry
            .register(
                &self.instance.instance_id,
                &self.instance.service_name,
                &self.instance.address,
            )
            .await?;

        tracing::info!(
            service_name = %self.instance.service_name,
            instance_id = %self.instance.instance_id,
            interval_ms = self.interval.as_millis() as u64,
            "Heartbeat reporter started"
        );

        let token = shutdown.child_token();
        let instance = self.instance.clone();
        let task = tokio::spawn(self.run(token.clone()));

        Ok(HeartbeatHandle {
            instance,
            token,
            task,
        })
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.beat().await,
            }
        }

        match self
            .registry
            .deregister(&self.instance.instance_id, &self.instance.service_name)
            .await
        {
            Ok(()) => tracing::info!(
                service_name = %self.instance.service_name,
                instance_id = %self.instance.instance_id,
                "Heartbeat reporter stopped, instance deregistered"
            ),
            Err(e) => tracing::warn!(
                service_name = %self.instance.service_name,
                instance_id = %self.instance.instance_id,
                error = %e,
                "Failed to deregister instance on shutdown"
            ),
        }
    }

    async fn beat(&self) {
        let instance = &self.instance;
        let Err(e) = self
            .registry
            .report_healthy_state(&instance.instance_id, &instance.service_name)
            .await
        else {
            return;
        };

        if e.is_not_registered() && self.reregister_on_missing {
            tracing::warn!(
                service_name = %instance.service_name,
                instance_id = %instance.instance_id,
                "Instance missing from registry, registering again"
            );
            if let Err(e) = self
                .registry
                .register(&instance.instance_id, &instance.service_name, &instance.address)
                .await
            {
                tracing::warn!(
                    service_name = %instance.service_name,
                    instance_id = %instance.instance_id,
                    error = %e,
                    "Failed to re-register instance"
                );
            }
            return;
        }

        tracing::warn!(
            service_name = %instance.service_name,
            instance_id = %instance.instance_id,
            error = %e,
            "Failed to report healthy state"
        );
    }
}

/// 运行中的心跳任务句柄
#[derive(Debug)]
pub struct HeartbeatHandle {
    instance: InstanceInfo,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 停止心跳并等待注销完成
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(
                service_name = %self.instance.service_name,
                error = %e,
                "Heartbeat task terminated abnormally"
            );
        }
    }
}
