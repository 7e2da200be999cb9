use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tonic::Code;
use tonic::transport::Channel;

use cohere_cluster::NodeRegistry;
use cohere_core::NodeId;
use cohere_node::KvStore;
use cohere_proto::manager_service_client::ManagerServiceClient;
use cohere_proto::{DeleteRequest, GetRequest, SetRequest};

use crate::helpers::{TestNode, test_registry};

struct TestManager {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TestManager {
    async fn start(registry: Arc<NodeRegistry>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            cohere_manager::grpc::serve_on(listener, registry, shutdown_rx)
                .await
                .unwrap();
        });
        TestManager {
            addr,
            shutdown_tx,
            handle,
        }
    }

    async fn client(&self) -> ManagerServiceClient<Channel> {
        ManagerServiceClient::connect(format!("http://{}", self.addr))
            .await
            .unwrap()
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

#[tokio::test]
async fn test_empty_cluster_is_unavailable() {
    let manager = TestManager::start(test_registry()).await;
    let mut client = manager.client().await;

    let status = client
        .get(GetRequest { key: "k".into() })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(status.message(), "No available database servers");

    let status = client
        .set(SetRequest {
            key: "k".into(),
            value: "v".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    manager.stop().await;
}

#[tokio::test]
async fn test_set_get_delete_round_trip() {
    let node = TestNode::start().await;
    let registry = test_registry();
    registry
        .add_server(NodeId::from("n1"), "local", &node.address())
        .unwrap();
    let manager = TestManager::start(registry).await;
    let mut client = manager.client().await;

    let resp = client
        .set(SetRequest {
            key: "color".into(),
            value: "blue".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(resp.success);
    assert_eq!(node.store.get("color").unwrap(), "blue");

    let resp = client
        .get(GetRequest {
            key: "color".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.value, "blue");

    let resp = client
        .delete(DeleteRequest {
            key: "color".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(resp.success);

    let status = client
        .get(GetRequest {
            key: "color".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    manager.stop().await;
    node.stop().await;
}

#[tokio::test]
async fn test_dead_backend_is_unavailable() {
    let node = TestNode::start().await;
    let address = node.address();
    node.stop().await;

    let registry = test_registry();
    registry
        .add_server(NodeId::from("dead"), "local", &address)
        .unwrap();
    let manager = TestManager::start(registry).await;
    let mut client = manager.client().await;

    let status = client
        .get(GetRequest { key: "k".into() })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    manager.stop().await;
}

#[tokio::test]
async fn test_delete_missing_key_not_found() {
    let node = TestNode::start().await;
    let registry = test_registry();
    registry
        .add_server(NodeId::from("n1"), "local", &node.address())
        .unwrap();
    let manager = TestManager::start(registry).await;
    let mut client = manager.client().await;

    let status = client
        .delete(DeleteRequest {
            key: "missing".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert!(status.message().contains("missing"));

    manager.stop().await;
    node.stop().await;
}
