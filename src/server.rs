use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tonic::transport::Server;

use crate::config::{Config, RegistryMode, Role, ServiceConfig};
use crate::discovery::{
    HeartbeatHandle, HeartbeatReporter, InstanceInfo, MemoryRegistry, RegistryError,
    RegistryGrpcService, RemoteRegistry, SharedRegistry,
};
use crate::gateway::{Gateway, MetadataGateway, RatingGateway};
use crate::limiter::{AdmissionInterceptor, AdmissionLimiter};
use crate::model::{Metadata, MovieId};
use crate::pb::{
    metadata_service_server::MetadataServiceServer, movie_service_server::MovieServiceServer,
    rating_service_server::RatingServiceServer,
};
use crate::services::metadata::{MetadataController, MetadataHandler};
use crate::services::movie::{MovieController, MovieHandler};
use crate::services::rating::{RatingController, RatingHandler};
use crate::services::{METADATA_SERVICE, MOVIE_SERVICE, RATING_SERVICE};
use crate::storage::{MemoryMetadataRepository, MemoryRatingRepository, TtlCache};

/// 远程注册中心调用的默认超时
const REGISTRY_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl Role {
    fn hosts_registry(self) -> bool {
        matches!(self, Role::Registry | Role::Standalone)
    }

    fn hosts(self, service: Role) -> bool {
        self == service || self == Role::Standalone
    }
}

/// 绑定配置的监听地址并运行，直到收到 ctrl-c 或 SIGTERM
pub async fn start(config: Config) -> Result<(), ServerError> {
    let address = config.service.listen_addr.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind { address, source })?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    serve(config, listener, shutdown).await
}

/// 在给定的监听器上运行节点，`shutdown` 触发后停止
///
/// 退出前停止所有心跳任务，每个实例注销一次。
pub async fn serve(
    config: Config,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let role = config.service.role;
    let local_addr = listener.local_addr()?;
    let advertise_addr = advertise_address(&config.service, local_addr);
    let registry = build_registry(&config)?;

    let interceptor = if config.limiter.enabled {
        AdmissionInterceptor::new(Arc::new(AdmissionLimiter::new(
            config.limiter.rate,
            config.limiter.burst,
        )))
    } else {
        AdmissionInterceptor::disabled()
    };

    let registry_server = role
        .hosts_registry()
        .then(|| RegistryGrpcService::new(registry.clone()).into_server());

    let metadata_server = role.hosts(Role::Metadata).then(|| {
        let cache = TtlCache::<MovieId, Metadata>::new(config.cache.ttl());
        let controller =
            MetadataController::new(Arc::new(MemoryMetadataRepository::default()), Arc::new(cache));
        MetadataServiceServer::with_interceptor(MetadataHandler::new(controller), interceptor.clone())
    });

    let rating_server = role.hosts(Role::Rating).then(|| {
        let cache = TtlCache::<MovieId, f64>::new(config.cache.ttl());
        let controller =
            RatingController::new(Arc::new(MemoryRatingRepository::default()), Arc::new(cache));
        RatingServiceServer::with_interceptor(RatingHandler::new(controller), interceptor.clone())
    });

    let movie_server = role.hosts(Role::Movie).then(|| {
        let retry = config.retry.policy();
        let metadata = MetadataGateway::new(gateway(&config, METADATA_SERVICE, &registry), retry.clone());
        let rating = RatingGateway::new(gateway(&config, RATING_SERVICE, &registry), retry);
        let controller = MovieController::new(Arc::new(metadata), Arc::new(rating));
        MovieServiceServer::with_interceptor(MovieHandler::new(controller), interceptor.clone())
    });

    let hosted: Vec<&str> = [
        (metadata_server.is_some(), METADATA_SERVICE),
        (rating_server.is_some(), RATING_SERVICE),
        (movie_server.is_some(), MOVIE_SERVICE),
    ]
    .into_iter()
    .filter_map(|(hosted, name)| hosted.then_some(name))
    .collect();

    let heartbeats = try_join_all(hosted.iter().map(|name| {
        let instance = InstanceInfo::generate(name, &advertise_addr);
        HeartbeatReporter::new(registry.clone(), instance)
            .with_interval(config.registry.heartbeat_interval())
            .with_reregister_on_missing(config.registry.reregister_on_missing)
            .start(&shutdown)
    }))
    .await
    .inspect_err(|_| shutdown.cancel())?;

    tracing::info!(
        role = ?role,
        listen_addr = %local_addr,
        advertise_addr = %advertise_addr,
        services = ?hosted,
        limiter_enabled = config.limiter.enabled,
        "Node listening"
    );

    let result = Server::builder()
        .add_optional_service(registry_server)
        .add_optional_service(metadata_server)
        .add_optional_service(rating_server)
        .add_optional_service(movie_server)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.cancelled())
        .await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Server terminated with error");
    }

    stop_heartbeats(heartbeats).await;
    tracing::info!(role = ?role, "Node stopped");
    result.map_err(ServerError::from)
}

fn build_registry(config: &Config) -> Result<SharedRegistry, ServerError> {
    // 承载注册中心的节点总是使用进程内注册表
    if config.service.role.hosts_registry() || config.registry.mode == RegistryMode::Local {
        return Ok(Arc::new(MemoryRegistry::new(config.registry.liveness_window())));
    }

    let timeout = config.gateway.request_timeout().unwrap_or(REGISTRY_REQUEST_TIMEOUT);
    let registry = RemoteRegistry::connect_lazy(
        &config.registry.address,
        config.gateway.connect_timeout(),
        timeout,
    )?;
    tracing::info!(address = %config.registry.address, "Using remote registry");
    Ok(Arc::new(registry))
}

fn gateway(config: &Config, service_name: &str, registry: &SharedRegistry) -> Gateway {
    let gateway = Gateway::new(service_name, registry.clone())
        .with_selector(config.gateway.selection.build())
        .with_connect_timeout(config.gateway.connect_timeout());
    match config.gateway.request_timeout() {
        Some(timeout) => gateway.with_request_timeout(timeout),
        None => gateway,
    }
}

/// 未配置对外地址时，通配监听地址按本机回环地址登记
fn advertise_address(service: &ServiceConfig, local_addr: SocketAddr) -> String {
    if let Some(addr) = &service.advertise_addr {
        return addr.clone();
    }
    if local_addr.ip().is_unspecified() {
        format!("127.0.0.1:{}", local_addr.port())
    } else {
        local_addr.to_string()
    }
}

async fn stop_heartbeats(heartbeats: Vec<HeartbeatHandle>) {
    let tracker = TaskTracker::new();
    for heartbeat in heartbeats {
        tracker.spawn(heartbeat.shutdown());
    }
    tracker.close();
    tracker.wait().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
