use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use cohere_core::{ClientConfig, ClusterError, NodeId, NodeInfo};

use crate::connection::{ConnectionHandle, NodeConnection};
use crate::ring::{HashRing, ReconcileOutcome};

/// A registered storage node.
pub struct Node {
    pub id: NodeId,
    pub region: String,
    pub address: String,
    connection: NodeConnection,
    consecutive_failures: u32,
}

impl Node {
    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id.clone(),
            region: self.region.clone(),
            address: self.address.clone(),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Result of one liveness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub failed: Vec<NodeId>,
    pub evicted: Vec<NodeId>,
}

/// Authoritative set of live nodes plus the hash ring derived from it.
///
/// The node map and the ring are only mutated together while the map's
/// write lock is held, and routing resolves a key under the map's read lock,
/// so a lookup never sees a ring member without its entry. No lock is held
/// across a network call.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, Node>>,
    ring: HashRing,
    client_config: ClientConfig,
}

impl NodeRegistry {
    pub fn new(client_config: ClientConfig) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            ring: HashRing::new(),
            client_config,
        }
    }

    fn read_nodes(&self) -> RwLockReadGuard<'_, HashMap<NodeId, Node>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_nodes(&self) -> RwLockWriteGuard<'_, HashMap<NodeId, Node>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    /// Register a node and place it on the ring.
    ///
    /// Fails with [`ClusterError::PositionTaken`] when another registered node
    /// already hashes to the same ring position, so every entry is always
    /// routable.
    pub fn add_server(&self, id: NodeId, region: &str, address: &str) -> Result<(), ClusterError> {
        let mut nodes = self.write_nodes();

        if nodes.contains_key(&id) {
            return Err(ClusterError::AlreadyRegistered(id));
        }
        if let Some(holder) = self.ring.occupant(&id) {
            warn!(node_id = %id, holder = %holder, "Ring position taken, rejecting node");
            return Err(ClusterError::PositionTaken { node: id, holder });
        }

        let connection = NodeConnection::open(&id, address, &self.client_config)?;

        self.ring.add_node(&id);
        nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                region: region.to_string(),
                address: address.to_string(),
                connection,
                consecutive_failures: 0,
            },
        );

        cohere_core::metrics::record_node_registered(region);
        cohere_core::metrics::set_live_nodes(nodes.len());
        info!(node_id = %id, region, address, "Registered node");
        Ok(())
    }

    /// Unregister a node, closing its connection and taking it off the ring.
    pub fn remove_server(&self, id: &NodeId) -> Result<(), ClusterError> {
        let mut nodes = self.write_nodes();

        let node = nodes
            .remove(id)
            .ok_or_else(|| ClusterError::UnknownNode(id.clone()))?;
        node.connection.close();
        self.ring.remove_node(id);

        cohere_core::metrics::set_live_nodes(nodes.len());
        info!(node_id = %id, address = %node.address, "Removed node");
        Ok(())
    }

    /// Rebuild ring membership from the registered node set.
    pub fn reconcile_servers(&self) -> ReconcileOutcome {
        let nodes = self.read_nodes();
        let outcome = self.ring.reconcile(nodes.keys());
        if !outcome.is_noop() {
            warn!(
                added = outcome.added,
                removed = outcome.removed,
                "Ring drifted from registry, reconciled"
            );
        }
        outcome
    }

    /// Probe every node and evict those that reached `failure_threshold`
    /// consecutive failures.
    ///
    /// Runs in two phases: connection handles are snapshotted under the read
    /// lock and probed concurrently with no lock held; results are then applied
    /// under the write lock. A result only counts against the entry whose
    /// connection produced it, and a probe cut short by
    /// [`ClusterError::ConnectionClosed`] is not a liveness failure.
    pub async fn health_check_servers(
        &self,
        probe_timeout: Duration,
        failure_threshold: u32,
    ) -> SweepReport {
        let started = Instant::now();
        let snapshot: Vec<ConnectionHandle> = self
            .read_nodes()
            .values()
            .map(|node| node.connection.handle())
            .collect();

        let probes = snapshot.iter().map(|handle| async move {
            let result = match tokio::time::timeout(probe_timeout, handle.health_check()).await {
                Ok(result) => result,
                Err(_) => Err(ClusterError::BackendUnavailable(format!(
                    "health probe timed out after {}ms",
                    probe_timeout.as_millis()
                ))),
            };
            (handle.node_id().clone(), handle.generation(), result)
        });
        let results = join_all(probes).await;

        let mut report = SweepReport {
            probed: results.len(),
            ..SweepReport::default()
        };

        {
            let mut nodes = self.write_nodes();
            for (node_id, generation, result) in results {
                // Removed, or removed and registered again, while the probe
                // was in flight. The result says nothing about the current entry.
                let Some(node) = nodes
                    .get_mut(&node_id)
                    .filter(|node| node.connection.generation() == generation)
                else {
                    debug!(node_id = %node_id, "Discarding probe result for replaced entry");
                    continue;
                };

                match result {
                    Ok(()) => node.consecutive_failures = 0,
                    Err(ClusterError::ConnectionClosed(_)) => {
                        debug!(node_id = %node_id, "Probe cut short by connection close");
                    }
                    Err(e) => {
                        node.consecutive_failures += 1;
                        warn!(
                            node_id = %node_id,
                            address = %node.address,
                            failures = node.consecutive_failures,
                            error = %e,
                            "Health probe failed"
                        );
                        report.failed.push(node_id.clone());

                        if node.consecutive_failures >= failure_threshold.max(1) {
                            if let Some(node) = nodes.remove(&node_id) {
                                node.connection.close();
                                self.ring.remove_node(&node_id);
                                cohere_core::metrics::record_node_evicted();
                                warn!(node_id = %node_id, address = %node.address, "Evicted unresponsive node");
                            }
                            report.evicted.push(node_id);
                        }
                    }
                }
            }
            cohere_core::metrics::set_live_nodes(nodes.len());
        }

        self.reconcile_servers();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        cohere_core::metrics::record_health_sweep(elapsed_ms);
        debug!(
            probed = report.probed,
            failed = report.failed.len(),
            evicted = report.evicted.len(),
            elapsed_ms,
            "Health sweep complete"
        );
        report
    }

    /// Resolve the node owning `key` and clone out its connection handle.
    fn route(&self, key: &str) -> Result<ConnectionHandle, ClusterError> {
        let nodes = self.read_nodes();
        let node_id = self.ring.lookup(key).ok_or(ClusterError::NoAvailableNodes)?;

        match nodes.get(&node_id) {
            Some(node) => Ok(node.connection.handle()),
            None => {
                error!(node_id = %node_id, "Ring member missing from registry");
                Err(ClusterError::UnknownNode(node_id))
            }
        }
    }

    pub async fn get_key(&self, key: &str) -> Result<String, ClusterError> {
        let result = async { self.route(key)?.get(key).await }.await;
        record_outcome("get", &result);
        result
    }

    pub async fn set_key(&self, key: &str, value: &str) -> Result<bool, ClusterError> {
        let result = async { self.route(key)?.set(key, value).await }.await;
        record_outcome("set", &result);
        result
    }

    pub async fn delete_key(&self, key: &str) -> Result<bool, ClusterError> {
        let result = async { self.route(key)?.delete(key).await }.await;
        record_outcome("delete", &result);
        result
    }

    /// Node currently responsible for `key`.
    pub fn owner_of(&self, key: &str) -> Option<NodeId> {
        self.ring.lookup(key)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.read_nodes().contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<NodeInfo> {
        self.read_nodes().get(id).map(Node::info)
    }

    pub fn failures_of(&self, id: &NodeId) -> Option<u32> {
        self.read_nodes().get(id).map(Node::consecutive_failures)
    }

    /// All registered nodes, sorted by identifier.
    pub fn servers(&self) -> Vec<NodeInfo> {
        let mut servers: Vec<NodeInfo> = self.read_nodes().values().map(Node::info).collect();
        servers.sort_by(|a, b| a.id.cmp(&b.id));
        servers
    }

    pub fn len(&self) -> usize {
        self.read_nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_outcome<T>(op: &'static str, result: &Result<T, ClusterError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(ClusterError::KeyNotFound(_)) => "not_found",
        Err(ClusterError::NoAvailableNodes) => "no_nodes",
        Err(_) => "error",
    };
    cohere_core::metrics::record_request(op, outcome);
}
