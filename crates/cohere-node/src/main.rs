#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use cohere_node::grpc;
use cohere_node::{FjallStore, KvStore, MemoryStore, RegistrationClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cohere=info".into()),
        )
        .init();

    info!("Starting cohere storage node");

    let config_path = std::env::args().nth(1);
    let config = cohere_core::NodeConfig::load(config_path.as_deref())?;

    let store: Arc<dyn KvStore> = if config.in_memory {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FjallStore::open(config.db_path())?)
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Serve before registering so the manager's first probe finds us.
    let grpc_addr = config.grpc_addr.parse()?;
    let grpc_shutdown = shutdown_rx.clone();
    let grpc_handle = tokio::spawn(async move {
        if let Err(e) = grpc::serve_grpc(grpc_addr, store, grpc_shutdown).await {
            error!(error = %e, "Node gRPC server failed");
        }
    });

    let registration = RegistrationClient::new(&config.manager_http_addr)?;
    let region = config.region.clone();
    let announced = config.announced_addr().to_string();
    let reg_config = config.registration.clone();
    let reg_shutdown = shutdown_rx.clone();
    let registration_handle = tokio::spawn(async move {
        match registration
            .register_with_retry(&region, &announced, &reg_config, reg_shutdown)
            .await
        {
            Ok(server_uuid) => info!(server_uuid = %server_uuid, region = %region, "Node is serving"),
            Err(e) => info!(error = %e, "Registration abandoned"),
        }
    });

    info!(
        region = %config.region,
        grpc_addr = %config.grpc_addr,
        manager = %config.manager_http_addr,
        "Cohere node started"
    );

    cohere_core::shutdown::wait_for_shutdown().await;
    info!("Shutdown signal received, draining...");
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(tokio::time::Duration::from_secs(10), async {
        let _ = registration_handle.await;
        let _ = grpc_handle.await;
    })
    .await;

    info!("Cohere node stopped");
    Ok(())
}
