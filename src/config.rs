use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{Backoff, RetryPolicy, SelectionPolicy};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "MOVIE_MESH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// 覆盖单项配置的环境变量前缀
pub const ENV_PREFIX: &str = "MOVIE_MESH_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid environment override: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// 进程角色
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Registry,
    Metadata,
    Rating,
    Movie,
    /// 注册中心与三个服务运行在同一进程、同一端口
    #[default]
    Standalone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    /// 进程内注册表
    #[default]
    Local,
    /// 通过 gRPC 访问独立的注册中心
    Remote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub registry: RegistryConfig,
    pub gateway: GatewayConfig,
    pub retry: RetryConfig,
    pub limiter: LimiterConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub role: Role,
    pub listen_addr: String,
    /// 注册到注册表的地址，缺省时由监听地址推导
    pub advertise_addr: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            role: Role::default(),
            listen_addr: "0.0.0.0:8081".to_string(),
            advertise_addr: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub mode: RegistryMode,
    pub address: String,
    pub liveness_window_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub reregister_on_missing: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mode: RegistryMode::default(),
            address: "127.0.0.1:8500".to_string(),
            liveness_window_secs: 5,
            heartbeat_interval_secs: 1,
            reregister_on_missing: false,
        }
    }
}

impl RegistryConfig {
    pub fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub connect_timeout_ms: u64,
    /// 单次尝试超时，0 表示不限制
    pub request_timeout_ms: u64,
    pub selection: SelectionPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            request_timeout_ms: 0,
            selection: SelectionPolicy::default(),
        }
    }
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    None,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::gateway::retry::DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffKind::default(),
            base_ms: 100,
            max_ms: 2_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let backoff = match self.backoff {
            BackoffKind::None => Backoff::None,
            BackoffKind::Exponential => Backoff::Exponential {
                base: Duration::from_millis(self.base_ms),
                max: Duration::from_millis(self.max_ms),
                jitter: self.jitter,
            },
        };
        RetryPolicy::new(self.max_attempts).with_backoff(backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub enabled: bool,
    pub rate: f64,
    pub burst: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: crate::limiter::DEFAULT_RATE,
            burst: crate::limiter::DEFAULT_BURST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 60 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `MOVIE_MESH_*` 环境变量覆盖项
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    role: Option<Role>,
    listen_addr: Option<String>,
    advertise_addr: Option<String>,
    registry_addr: Option<String>,
    log_level: Option<String>,
}

impl Config {
    /// 读取配置文件并应用环境变量覆盖
    ///
    /// 未设置 `MOVIE_MESH_CONFIG` 且默认文件不存在时使用默认配置。
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            Err(_) => Self::default(),
        };

        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(role) = overrides.role {
            self.service.role = role;
        }
        if let Some(addr) = overrides.listen_addr {
            self.service.listen_addr = addr;
        }
        if let Some(addr) = overrides.advertise_addr {
            self.service.advertise_addr = Some(addr);
        }
        if let Some(addr) = overrides.registry_addr {
            self.registry.address = addr;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.service.listen_addr.trim().is_empty() {
            return invalid("service.listen_addr must not be empty");
        }
        if self.registry.liveness_window_secs == 0 {
            return invalid("registry.liveness_window_secs must be positive");
        }
        if self.registry.heartbeat_interval_secs == 0 {
            return invalid("registry.heartbeat_interval_secs must be positive");
        }
        if self.registry.heartbeat_interval_secs >= self.registry.liveness_window_secs {
            return invalid("registry.heartbeat_interval_secs must be shorter than the liveness window");
        }
        if self.registry.mode == RegistryMode::Remote && self.registry.address.trim().is_empty() {
            return invalid("registry.address is required in remote mode");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.limiter.burst < 1 {
            return invalid("limiter.burst must be at least 1");
        }
        if self.limiter.rate.is_nan() || self.limiter.rate <= 0.0 {
            return invalid("limiter.rate must be positive");
        }
        if self.cache.ttl_secs == 0 {
            return invalid("cache.ttl_secs must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.registry.liveness_window(), Duration::from_secs(5));
        assert_eq!(config.registry.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(config.retry.policy().max_attempts(), 5);
        assert_eq!(config.limiter.burst, 100);
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.gateway.request_timeout(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [service]
            role = "movie"
            listen_addr = "0.0.0.0:8083"

            [registry]
            mode = "remote"
            address = "registry:8500"

            [gateway]
            selection = "round_robin"

            [retry]
            backoff = "exponential"
            base_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.service.role, Role::Movie);
        assert_eq!(config.registry.mode, RegistryMode::Remote);
        assert_eq!(config.registry.liveness_window_secs, 5);
        assert_eq!(config.gateway.selection, SelectionPolicy::RoundRobin);
        assert_eq!(config.retry.backoff, BackoffKind::Exponential);
        assert_eq!(config.retry.max_ms, 2_000);
        assert!(config.limiter.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = Config::from_toml("[service]\nrole = \"gateway\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.registry.heartbeat_interval_secs = 5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limiter.burst = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limiter.rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.registry.liveness_window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = Config::default();
        config.apply(EnvOverrides {
            role: Some(Role::Rating),
            listen_addr: Some("0.0.0.0:8082".to_string()),
            advertise_addr: Some("rating:8082".to_string()),
            registry_addr: Some("registry:8500".to_string()),
            log_level: Some("debug".to_string()),
        });

        assert_eq!(config.service.role, Role::Rating);
        assert_eq!(config.service.listen_addr, "0.0.0.0:8082");
        assert_eq!(config.service.advertise_addr.as_deref(), Some("rating:8082"));
        assert_eq!(config.registry.address, "registry:8500");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file("/nonexistent/movie_mesh.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
