#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info, warn};

use cohere_cluster::{HealthMonitor, NodeRegistry};
use cohere_manager::{grpc, rest};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cohere=info,tower_http=info".into()),
        )
        .init();

    info!("Starting cohere manager");

    let config_path = std::env::args().nth(1);
    let config = cohere_core::ManagerConfig::load(config_path.as_deref())?;

    let registry = Arc::new(NodeRegistry::new(config.client.clone()));

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let monitor_handle =
        HealthMonitor::new(registry.clone(), config.health.clone()).spawn(shutdown_rx.clone());

    let metrics_handle = match metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, /metrics disabled");
            None
        }
    };

    let grpc_addr = config.grpc_addr.parse()?;
    let grpc_registry = registry.clone();
    let grpc_shutdown = shutdown_rx.clone();
    let grpc_handle = tokio::spawn(async move {
        if let Err(e) = grpc::serve_grpc(grpc_addr, grpc_registry, grpc_shutdown).await {
            error!(error = %e, "gRPC server failed");
        }
    });

    let http_addr = config.http_addr.parse()?;
    let rest_registry = registry.clone();
    let rest_shutdown = shutdown_rx.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = rest::serve_rest(http_addr, rest_registry, metrics_handle, rest_shutdown).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    info!(
        grpc_addr = %config.grpc_addr,
        http_addr = %config.http_addr,
        health_interval_ms = config.health.interval_ms,
        "Cohere manager started"
    );

    cohere_core::shutdown::wait_for_shutdown().await;
    info!("Shutdown signal received, draining...");
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(
        tokio::time::Duration::from_secs(config.shutdown_timeout_secs),
        async {
            let _ = monitor_handle.await;
            let _ = grpc_handle.await;
            let _ = http_handle.await;
        },
    )
    .await;
    if drained.is_err() {
        warn!("Shutdown timed out before all tasks finished");
    }

    info!("Cohere manager stopped");
    Ok(())
}
