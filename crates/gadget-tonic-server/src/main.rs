use std::sync::Arc;

use clap::Parser;
use gadget_tonic_core::proto::{
    FILE_DESCRIPTOR_SET, auth_server::AuthServer, catalog_server::CatalogServer,
};
use gadget_tonic_server::server::{
    auth::{AccessPolicy, AuthLayer, TokenManager},
    config::{CliArgs, ServerConfig},
    service::{AuthService, CatalogService},
    store::{AssetStore, CatalogStore, RatingAggregator, UserStore, seed_default_users},
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tracing_subscriber::EnvFilter;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let tcp = TcpListener::bind(&config.server_addr).await?;
    let incoming = TcpListenerStream::new(tcp);
    tracing::info!("starting catalog service on {}", config.server_addr);

    run_server_with_incoming(incoming, config).await
}

async fn run_server_with_incoming(
    incoming: TcpListenerStream,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<CatalogServer<CatalogService>>()
        .await;

    let catalog_store = Arc::new(CatalogStore::new());
    let asset_store = Arc::new(AssetStore::new(config.asset_dir.clone()));
    let rating_store = Arc::new(RatingAggregator::new());

    let user_store = Arc::new(UserStore::new());
    seed_default_users(&user_store)?;

    let tokens = TokenManager::new(&config.token_secret, config.token_ttl);
    let auth_service = AuthService::new(Arc::clone(&user_store), tokens.clone());
    let catalog_service =
        CatalogService::new(config, catalog_store, asset_store, rating_store);

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .layer(AuthLayer::new(tokens, AccessPolicy::catalog_defaults()))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(AuthServer::new(auth_service))
        .add_service(CatalogServer::new(catalog_service))
        .serve_with_incoming_shutdown(incoming, shutdown_signal(health_reporter))
        .await?;

    tracing::info!("catalog service shut down");
    Ok(())
}

async fn shutdown_signal(health_reporter: HealthReporter) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("received SIGTERM signal");
        },
    }

    tracing::info!("shutdown signal received, terminating gracefully...");

    health_reporter
        .set_not_serving::<CatalogServer<CatalogService>>()
        .await;
}
