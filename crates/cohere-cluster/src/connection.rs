use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use cohere_core::{ClientConfig, ClusterError, NodeId};
use cohere_proto::node_service_client::NodeServiceClient;
use cohere_proto::{DeleteRequest, GetRequest, HealthCheckRequest, SetRequest};

/// Connection to one storage node, owned by that node's registry entry.
///
/// The channel is established lazily; [`NodeConnection::open`] only fails
/// when `address` cannot form a valid endpoint. Calls go through
/// [`ConnectionHandle`]s, which observe [`NodeConnection::close`].
pub struct NodeConnection {
    handle: ConnectionHandle,
    closed_tx: watch::Sender<bool>,
}

/// Cloneable view of a [`NodeConnection`] used to issue RPCs without holding
/// any registry lock.
#[derive(Clone)]
pub struct ConnectionHandle {
    node_id: NodeId,
    generation: u64,
    client: NodeServiceClient<Channel>,
    closed_rx: watch::Receiver<bool>,
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

impl NodeConnection {
    /// Must be called from within a tokio runtime.
    pub fn open(node_id: &NodeId, address: &str, config: &ClientConfig) -> Result<Self, ClusterError> {
        let uri = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };

        let channel = Endpoint::from_shared(uri)
            .map_err(|e| ClusterError::InvalidAddress(format!("{address}: {e}")))?
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .connect_lazy();

        let (closed_tx, closed_rx) = watch::channel(false);

        Ok(Self {
            handle: ConnectionHandle {
                node_id: node_id.clone(),
                generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
                client: NodeServiceClient::new(channel),
                closed_rx,
            },
            closed_tx,
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn generation(&self) -> u64 {
        self.handle.generation
    }

    /// Mark the connection closed. In-flight and future calls through any
    /// handle fail with [`ClusterError::ConnectionClosed`]; the channel is torn
    /// down once the last handle is dropped.
    pub fn close(&self) {
        self.closed_tx.send_replace(true);
        debug!(node_id = %self.handle.node_id, "Node connection closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }
}

impl Drop for NodeConnection {
    fn drop(&mut self) {
        self.closed_tx.send_replace(true);
    }
}

impl ConnectionHandle {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Process-unique id of the [`NodeConnection`] this handle came from.
    /// Differs between two registrations of the same node id.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    pub async fn get(&self, key: &str) -> Result<String, ClusterError> {
        let mut client = self.client.clone();
        let request = GetRequest {
            key: key.to_string(),
        };
        let resp = self.guarded(key, client.get(request)).await?;
        Ok(resp.value)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<bool, ClusterError> {
        let mut client = self.client.clone();
        let request = SetRequest {
            key: key.to_string(),
            value: value.to_string(),
        };
        let resp = self.guarded(key, client.set(request)).await?;
        Ok(resp.success)
    }

    pub async fn delete(&self, key: &str) -> Result<bool, ClusterError> {
        let mut client = self.client.clone();
        let request = DeleteRequest {
            key: key.to_string(),
        };
        let resp = self.guarded(key, client.delete(request)).await?;
        Ok(resp.success)
    }

    pub async fn health_check(&self) -> Result<(), ClusterError> {
        let mut client = self.client.clone();
        self.guarded("", client.health_check(HealthCheckRequest {}))
            .await
            .map(|_| ())
    }

    /// Run `call`, failing fast if the owning entry closes the connection
    /// before the node answers.
    async fn guarded<T, F>(&self, key: &str, call: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        if self.is_closed() {
            return Err(ClusterError::ConnectionClosed(self.node_id.clone()));
        }

        tokio::select! {
            result = call => result
                .map(tonic::Response::into_inner)
                .map_err(|status| ClusterError::from_status(key, status)),
            _ = wait_closed(self.closed_rx.clone()) => {
                Err(ClusterError::ConnectionClosed(self.node_id.clone()))
            }
        }
    }
}

async fn wait_closed(mut closed_rx: watch::Receiver<bool>) {
    loop {
        if *closed_rx.borrow_and_update() {
            return;
        }
        if closed_rx.changed().await.is_err() {
            return;
        }
    }
}
