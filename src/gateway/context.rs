use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Request;

use super::GatewayError;

/// 单次调用的取消/截止时间信号
///
/// 入站请求会根据 `grpc-timeout` 头构造上下文，出站调用携带剩余时间。
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        // 只能收紧，不能放宽
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// 根据入站 gRPC 请求的 `grpc-timeout` 头构造上下文
    pub fn from_request<T>(request: &Request<T>) -> Self {
        let timeout = request
            .metadata()
            .get("grpc-timeout")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout);

        match timeout {
            Some(timeout) => Self::with_timeout(timeout),
            None => Self::new(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// 构造出站请求，携带剩余的截止时间
    pub fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(remaining) = self.remaining() {
            request.set_timeout(remaining);
        }
        request
    }

    /// 在取消或截止时间到达时完成，返回对应的错误
    pub async fn done(&self) -> GatewayError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => GatewayError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => GatewayError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                GatewayError::Cancelled
            }
        }
    }
}

// grpc-timeout 格式: 最多 8 位数字 + 单位 (H/M/S/m/u/n)
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grpc_timeout() {
        assert_eq!(parse_grpc_timeout("100m"), Some(Duration::from_millis(100)));
        assert_eq!(parse_grpc_timeout("3S"), Some(Duration::from_secs(3)));
        assert_eq!(parse_grpc_timeout("2M"), Some(Duration::from_secs(120)));
        assert_eq!(parse_grpc_timeout("1H"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_grpc_timeout("5u"), Some(Duration::from_micros(5)));
        assert_eq!(parse_grpc_timeout("7n"), Some(Duration::from_nanos(7)));
        assert_eq!(parse_grpc_timeout("m"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
    }

    #[tokio::test]
    async fn test_from_request_reads_timeout_header() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("grpc-timeout", "500m".parse().unwrap());

        let ctx = CallContext::from_request(&request);
        let remaining = ctx.remaining().unwrap();
        assert!(remaining <= Duration::from_millis(500));

        let ctx = CallContext::from_request(&Request::new(()));
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn test_done_on_cancel() {
        let ctx = CallContext::new();
        ctx.cancel();
        assert!(matches!(ctx.done().await, GatewayError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_on_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        assert!(matches!(ctx.done().await, GatewayError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_only_tightens() {
        let ctx = CallContext::with_timeout(Duration::from_secs(1))
            .with_deadline(Instant::now() + Duration::from_secs(10));
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(1)));
    }
}
