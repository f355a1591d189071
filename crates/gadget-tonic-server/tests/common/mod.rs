//! Shared harness for the integration suites: boots the full server stack
//! (auth layer included) on an ephemeral port and hands back clients and
//! store handles.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gadget_tonic_client::{CatalogClient, CredentialAgent};
use gadget_tonic_core::proto::{
    Cpu, Device, Memory, auth_server::AuthServer, catalog_server::CatalogServer, memory,
};
use gadget_tonic_server::server::{
    auth::{AccessPolicy, AuthLayer, TokenManager},
    config::ServerConfig,
    service::{AuthService, CatalogService},
    store::{AssetStore, CatalogStore, RatingAggregator, UserStore, seed_default_users},
};
use rand::Rng;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret";

pub struct TestServer {
    pub addr: SocketAddr,
    pub asset_dir: PathBuf,
    pub catalog: Arc<CatalogStore>,
    pub assets: Arc<AssetStore>,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        server_addr: "127.0.0.1:0".to_string(),
        token_secret: TEST_SECRET.to_string(),
        token_ttl: Duration::from_secs(900),
        asset_dir: std::env::temp_dir().join(format!("gadget-test-assets-{}", Uuid::new_v4())),
        stream_buffer_size: 8,
    }
}

pub async fn start_server() -> TestServer {
    start_server_with(test_config()).await
}

pub async fn start_server_with(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let catalog = Arc::new(CatalogStore::new());
    let assets = Arc::new(AssetStore::new(config.asset_dir.clone()));
    let ratings = Arc::new(RatingAggregator::new());

    let users = Arc::new(UserStore::new());
    seed_default_users(&users).unwrap();

    let tokens = TokenManager::new(&config.token_secret, config.token_ttl);
    let auth_service = AuthService::new(Arc::clone(&users), tokens.clone());
    let catalog_service = CatalogService::new(
        config.clone(),
        Arc::clone(&catalog),
        Arc::clone(&assets),
        Arc::clone(&ratings),
    );

    tokio::spawn(async move {
        Server::builder()
            .layer(AuthLayer::new(tokens, AccessPolicy::catalog_defaults()))
            .add_service(AuthServer::new(auth_service))
            .add_service(CatalogServer::new(catalog_service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    // Give the server a moment to start accepting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        asset_dir: config.asset_dir,
        catalog,
        assets,
    }
}

pub async fn connect(addr: SocketAddr) -> Channel {
    Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap()
}

pub async fn client_for(addr: SocketAddr, username: &str, password: &str) -> CatalogClient {
    let channel = connect(addr).await;
    let agent = Arc::new(CredentialAgent::new(
        channel.clone(),
        username,
        password,
        Duration::from_secs(30),
    ));
    CatalogClient::new(channel, agent)
}

pub async fn admin_client(addr: SocketAddr) -> CatalogClient {
    client_for(addr, "admin1", "secret").await
}

pub async fn user_client(addr: SocketAddr) -> CatalogClient {
    client_for(addr, "user1", "secret").await
}

/// A random plausible device with an empty id (the server assigns one).
pub fn sample_device() -> Device {
    let mut rng = rand::rng();

    let brands = ["acme", "initech", "umbrella"];

    let mut device = device_with(
        rng.random_range(300.0..5000.0),
        rng.random_range(2..=16),
        rng.random_range(2.0..5.0),
        rng.random_range(4..=64),
    );
    device.brand = brands[rng.random_range(0..brands.len())].to_string();
    device
}

/// A device with controlled search-relevant attributes and an empty id.
pub fn device_with(price: f64, cores: u32, ghz: f64, ram_gb: u64) -> Device {
    Device {
        id: String::new(),
        brand: "acme".to_string(),
        name: format!("box-{cores}c"),
        cpu: Some(Cpu {
            name: "x2000".to_string(),
            number_cores: cores,
            min_ghz: ghz,
        }),
        ram: Some(Memory {
            value: ram_gb,
            unit: memory::Unit::Gigabyte as i32,
        }),
        price_usd: price,
    }
}
