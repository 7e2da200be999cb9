use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use cohere_cluster::NodeRegistry;
use cohere_core::NodeId;
use cohere_core::api::{HealthResponse, RegisterRequest, RegisterResponse, ServersResponse};

#[derive(Clone)]
struct AppState {
    registry: Arc<NodeRegistry>,
    metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

pub fn build_router(
    registry: Arc<NodeRegistry>,
    metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> Router {
    let state = AppState {
        registry,
        metrics_handle,
    };

    Router::new()
        .route("/register", post(register))
        .route("/health", get(health))
        .route("/servers", get(servers))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve_rest(
    addr: SocketAddr,
    registry: Arc<NodeRegistry>,
    metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    let app = build_router(registry, metrics_handle);

    info!("HTTP server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> impl IntoResponse {
    if body.region.is_empty() || body.grpc_addr.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse {
                success: false,
                server_uuid: String::new(),
                message: "region and grpc_addr are required".to_string(),
            }),
        );
    }

    let server_uuid = NodeId::new();

    match state
        .registry
        .add_server(server_uuid.clone(), &body.region, &body.grpc_addr)
    {
        Ok(()) => {
            info!(
                server_uuid = %server_uuid,
                region = %body.region,
                grpc_addr = %body.grpc_addr,
                "Successfully registered server"
            );
            (
                StatusCode::OK,
                Json(RegisterResponse {
                    success: true,
                    server_uuid: server_uuid.0,
                    message: "Server registered successfully".to_string(),
                }),
            )
        }
        Err(e) => {
            error!(server_uuid = %server_uuid, error = %e, "Failed to add server");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse {
                    success: false,
                    server_uuid: String::new(),
                    message: format!("Failed to register server: {e}"),
                }),
            )
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    })
}

async fn servers(State(state): State<AppState>) -> Json<ServersResponse> {
    let servers = state.registry.servers();
    Json(ServersResponse {
        count: servers.len(),
        servers,
    })
}

async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render()),
        None => {
            warn!("Metrics requested but no recorder is installed");
            Err(StatusCode::NOT_FOUND)
        }
    }
}
