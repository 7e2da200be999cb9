use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use cohere_cluster::NodeRegistry;
use cohere_core::ClientConfig;
use cohere_node::{KvStore, MemoryStore};

/// Short deadlines so dead nodes fail fast in tests.
pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        connect_timeout_ms: 500,
        request_timeout_ms: 1_000,
    }
}

pub fn test_registry() -> Arc<NodeRegistry> {
    Arc::new(NodeRegistry::new(fast_client_config()))
}

/// A storage node serving `NodeService` on an ephemeral loopback port.
pub struct TestNode {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TestNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test node listener");
        let addr = listener.local_addr().expect("test node local addr");
        let store = Arc::new(MemoryStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let srv_store: Arc<dyn KvStore> = store.clone();
        let handle = tokio::spawn(async move {
            cohere_node::grpc::serve_on(listener, srv_store, shutdown_rx)
                .await
                .expect("node gRPC server failed");
        });

        TestNode {
            addr,
            store,
            shutdown_tx,
            handle,
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Stop serving. The port is released once this returns.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if tokio::time::timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .is_err()
        {
            self.handle.abort();
            let _ = self.handle.await;
        }
    }
}

/// Accepts TCP connections but never speaks, so every call to it hangs until
/// a deadline or a close cuts it off.
pub struct BlackHole {
    pub addr: SocketAddr,
    _listener: TcpListener,
}

impl BlackHole {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind black hole listener");
        let addr = listener.local_addr().expect("black hole local addr");
        BlackHole {
            addr,
            _listener: listener,
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn parse_response_json(
    response: axum::http::Response<Body>,
) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Random keys; crc32 over sequential strings is not uniform enough for
/// distribution checks.
pub fn random_keys(n: usize) -> Vec<String> {
    (0..n).map(|_| uuid::Uuid::new_v4().to_string()).collect()
}
