use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use cohere_cluster::NodeRegistry;
use cohere_proto::*;

/// Client-facing routing service. Each call is resolved on the ring and
/// forwarded to the owning node; registry errors map onto gRPC codes.
pub struct ManagerServiceImpl {
    registry: Arc<NodeRegistry>,
}

impl ManagerServiceImpl {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }
}

#[tonic::async_trait]
impl manager_service_server::ManagerService for ManagerServiceImpl {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let value = self.registry.get_key(&req.key).await.map_err(|e| {
            debug!(key = %req.key, error = %e, "Get failed");
            Status::from(e)
        })?;
        Ok(Response::new(GetResponse { value }))
    }

    async fn set(&self, request: Request<SetRequest>) -> Result<Response<SetResponse>, Status> {
        let req = request.into_inner();
        let success = self
            .registry
            .set_key(&req.key, &req.value)
            .await
            .map_err(|e| {
                debug!(key = %req.key, error = %e, "Set failed");
                Status::from(e)
            })?;
        if !success {
            return Err(Status::internal(format!(
                "failed to set key {:?}: operation unsuccessful",
                req.key
            )));
        }
        Ok(Response::new(SetResponse { success }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let req = request.into_inner();
        let success = self.registry.delete_key(&req.key).await.map_err(|e| {
            debug!(key = %req.key, error = %e, "Delete failed");
            Status::from(e)
        })?;
        if !success {
            return Err(Status::internal(format!(
                "failed to delete key {:?}: operation unsuccessful",
                req.key
            )));
        }
        Ok(Response::new(DeleteResponse { success }))
    }
}

pub async fn serve_grpc(
    addr: SocketAddr,
    registry: Arc<NodeRegistry>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, registry, shutdown).await
}

pub async fn serve_on(
    listener: TcpListener,
    registry: Arc<NodeRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    let local_addr = listener.local_addr()?;
    let manager_service = ManagerServiceImpl::new(registry);

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<manager_service_server::ManagerServiceServer<ManagerServiceImpl>>()
        .await;

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(cohere_proto::cohere::v1::FILE_DESCRIPTOR_SET)
        .build_v1()?;

    info!("gRPC server listening on {local_addr}");

    tonic::transport::Server::builder()
        .http2_keepalive_interval(Some(std::time::Duration::from_secs(10)))
        .http2_keepalive_timeout(Some(std::time::Duration::from_secs(5)))
        .add_service(health_service)
        .add_service(reflection_service)
        .add_service(manager_service_server::ManagerServiceServer::new(
            manager_service,
        ))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("gRPC server stopped");
    Ok(())
}
