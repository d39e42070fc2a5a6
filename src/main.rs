use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use video_gen_proxy::api::routes::{self, AppState};
use video_gen_proxy::task::retention;
use video_gen_proxy::{AppError, AppResult, Config};

#[tokio::main]
async fn main() {
    Config::dotenv_load();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("video_gen_proxy=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = Config::new()?;
    config.log_summary();

    let videos = routes::videos_dir(&config);
    tokio::fs::create_dir_all(&videos).await?;

    let state = Arc::new(AppState::from_config(&config)?);
    if let Some(ttl) = config.task_ttl {
        retention::spawn_pruner(Arc::clone(&state.registry), ttl);
    }
    tracing::info!(
        "provider: {} (configured: {}), enhancer configured: {}",
        state.provider.name(),
        state.provider.is_configured(),
        state.enhancer.is_configured()
    );

    let app = routes::app(state, &config);

    // Run with safe parsing of the bind address
    let ip: std::net::IpAddr = config.api_host.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_HOST '{}', falling back to 127.0.0.1", config.api_host);
        std::net::IpAddr::from([127, 0, 0, 1])
    });
    let port: u16 = config.api_port.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_PORT '{}', falling back to 8000", config.api_port);
        8000
    });
    let socket_address = SocketAddr::new(ip, port);
    tracing::info!("listening on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .await
        .map_err(|e| AppError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(())
}
