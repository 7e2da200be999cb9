use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use cohere_proto::*;

use crate::store::KvStore;

pub struct NodeServiceImpl {
    store: Arc<dyn KvStore>,
}

impl NodeServiceImpl {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl node_service_server::NodeService for NodeServiceImpl {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let value = self.store.get(&req.key)?;
        debug!(key = %req.key, "Get");
        Ok(Response::new(GetResponse { value }))
    }

    async fn set(&self, request: Request<SetRequest>) -> Result<Response<SetResponse>, Status> {
        let req = request.into_inner();
        self.store.set(&req.key, &req.value)?;
        debug!(key = %req.key, "Set");
        Ok(Response::new(SetResponse { success: true }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let req = request.into_inner();
        self.store.delete(&req.key)?;
        debug!(key = %req.key, "Delete");
        Ok(Response::new(DeleteResponse { success: true }))
    }

    async fn health_check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        Ok(Response::new(HealthCheckResponse {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }))
    }
}

pub async fn serve_grpc(
    addr: SocketAddr,
    store: Arc<dyn KvStore>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, store, shutdown).await
}

/// Serve `NodeService` on an already-bound listener until `shutdown` flips.
pub async fn serve_on(
    listener: TcpListener,
    store: Arc<dyn KvStore>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    let local_addr = listener.local_addr()?;
    let node_service = NodeServiceImpl::new(store);

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<node_service_server::NodeServiceServer<NodeServiceImpl>>()
        .await;

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(cohere_proto::cohere::v1::FILE_DESCRIPTOR_SET)
        .build_v1()?;

    info!("Node gRPC server listening on {local_addr}");

    tonic::transport::Server::builder()
        .add_service(health_service)
        .add_service(reflection_service)
        .add_service(node_service_server::NodeServiceServer::new(node_service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("Node gRPC server stopped");
    Ok(())
}
