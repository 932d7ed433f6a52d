use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tonic::Code;

use super::{CallContext, GatewayError};
use crate::discovery::RegistryError;

/// 默认最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// 失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retriable,
    Terminal,
}

pub type Classifier = fn(&GatewayError) -> Classification;

/// 默认分类器
///
/// 只有 deadline-exceeded、resource-exhausted、unavailable 可重试；
/// 连接失败等同于 unavailable，远程注册中心返回的状态码同样按上述规则分类。
/// 注册表 `NotFound`、调用方取消及其他远端错误都是终止性的。
pub fn classify_transient(err: &GatewayError) -> Classification {
    match err {
        GatewayError::Rpc(status) | GatewayError::Registry(RegistryError::Rpc(status)) => {
            classify_code(status.code())
        }
        GatewayError::Connect { .. } => Classification::Retriable,
        _ => Classification::Terminal,
    }
}

fn classify_code(code: Code) -> Classification {
    match code {
        Code::DeadlineExceeded | Code::ResourceExhausted | Code::Unavailable => Classification::Retriable,
        _ => Classification::Terminal,
    }
}

/// 重试间隔策略
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Backoff {
    /// 立即重试
    #[default]
    None,
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl Backoff {
    /// 第 `attempt` 次失败之后的等待时间
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::None => None,
            Self::Exponential { base, max, jitter } => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                let delay = base.saturating_mul(factor).min(max);
                if !jitter || delay.is_zero() {
                    return Some(delay);
                }
                let millis = delay.as_millis() as u64;
                Some(Duration::from_millis(rand::rng().random_range(0..=millis)))
            }
        }
    }
}

/// 重试策略
///
/// 只能用于可重复执行的操作（读操作或远端幂等的写操作）。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    classifier: Classifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::None,
            classifier: classify_transient,
        }
    }

    /// 只尝试一次，用于非幂等操作
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 执行调用，按分类结果决定是否重试
    ///
    /// `attempt` 收到从 1 开始的尝试序号，每次尝试都应重新解析地址。
    /// 调用方取消或截止时间到达时立即返回，包括尝试进行中。
    pub async fn run<T, F, Fut>(&self, ctx: &CallContext, mut attempt: F) -> Result<T, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                outcome = attempt(attempts) => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if (self.classifier)(&err) == Classification::Terminal {
                return Err(err);
            }

            if attempts >= self.max_attempts {
                tracing::warn!(
                    attempts = attempts,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(GatewayError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }

            tracing::warn!(
                attempt = attempts,
                max_attempts = self.max_attempts,
                error = %err,
                "Retriable failure, trying again"
            );

            if let Some(delay) = self.backoff.delay(attempts) {
                tokio::select! {
                    biased;
                    err = ctx.done() => return Err(err),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
