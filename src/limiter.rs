//! Admission limiter
//!
//! Token bucket evaluated once per inbound call before any business logic runs.
//! The decision is immediate: calls are never queued waiting for capacity.

use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tonic::service::Interceptor;
use tonic::{Request, Status};

pub const DEFAULT_RATE: f64 = 100.0;
pub const DEFAULT_BURST: u32 = 100;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// 令牌桶准入限流器
///
/// 以 `rate` 个/秒连续补充令牌，最多累积 `burst` 个。
#[derive(Debug)]
pub struct AdmissionLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl Default for AdmissionLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE, DEFAULT_BURST)
    }
}

impl AdmissionLimiter {
    /// 创建限流器，桶初始为满
    pub fn new(rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: rate.max(0.0),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 是否放行本次调用；放行时消耗一个令牌
    pub fn allow(&self) -> bool {
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// 挂在 tonic 服务前的拦截器，拒绝时返回 resource-exhausted
#[derive(Debug, Clone)]
pub struct AdmissionInterceptor {
    limiter: Option<Arc<AdmissionLimiter>>,
}

impl AdmissionInterceptor {
    pub fn new(limiter: Arc<AdmissionLimiter>) -> Self {
        Self {
            limiter: Some(limiter),
        }
    }

    /// 不做限流
    pub fn disabled() -> Self {
        Self { limiter: None }
    }
}

impl Interceptor for AdmissionInterceptor {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        match &self.limiter {
            Some(limiter) if !limiter.allow() => {
                tracing::debug!("Inbound call rejected by admission limiter");
                Err(Status::resource_exhausted("rate limit exceeded"))
            }
            _ => Ok(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = AdmissionLimiter::new(100.0, 100);

        for i in 0..100 {
            assert!(limiter.allow(), "call {i} should be admitted");
        }
        assert!(!limiter.allow(), "101st call should be rejected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_refill() {
        let limiter = AdmissionLimiter::new(100.0, 100);
        for _ in 0..100 {
            assert!(limiter.allow());
        }
        assert!(!limiter.allow());

        // 每 10ms 补充一个令牌
        tokio::time::advance(Duration::from_millis(15)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_burst() {
        let limiter = AdmissionLimiter::new(100.0, 10);
        tokio::time::advance(Duration::from_secs(60)).await;

        let admitted = (0..50).filter(|_| limiter.allow()).count();
        assert_eq!(admitted, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interceptor_rejects_with_resource_exhausted() {
        let mut interceptor = AdmissionInterceptor::new(Arc::new(AdmissionLimiter::new(1.0, 1)));

        assert!(interceptor.call(Request::new(())).is_ok());
        let status = interceptor.call(Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::ResourceExhausted);
    }

    #[test]
    fn test_disabled_interceptor_admits_everything() {
        let mut interceptor = AdmissionInterceptor::disabled();
        for _ in 0..1_000 {
            assert!(interceptor.call(Request::new(())).is_ok());
        }
    }
}
