use movie_mesh::config::Config;
use movie_mesh::{logging, server};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    logging::init(&config.logging);

    tracing::info!(
        role = ?config.service.role,
        listen_addr = %config.service.listen_addr,
        "Starting movie mesh node"
    );
    server::start(config).await?;
    Ok(())
}
