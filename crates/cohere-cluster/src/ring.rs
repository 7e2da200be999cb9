//! Consistent hash ring mapping keys to node identifiers.
//!
//! Every node occupies exactly one position, `crc32(node_id)`. A key is
//! owned by the first position at or after `crc32(key)`, wrapping around to
//! the smallest position when the key hashes past the end of the ring.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cohere_core::NodeId;
use tracing::{debug, warn};

/// Position of `key` on the ring.
pub fn hash_key(key: &str) -> u32 {
    crc32fast::hash(key.as_bytes())
}

/// Membership changes applied by a single [`HashRing::reconcile`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub removed: usize,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

#[derive(Debug, Default)]
struct RingState {
    /// Strictly increasing.
    positions: Vec<u32>,
    owners: HashMap<u32, NodeId>,
    members: HashSet<NodeId>,
}

impl RingState {
    fn insert(&mut self, node_id: &NodeId) -> bool {
        if self.members.contains(node_id) {
            return false;
        }

        let pos = hash_key(&node_id.0);
        match self.positions.binary_search(&pos) {
            Ok(_) => {
                warn!(node_id = %node_id, pos, "Ring position collision, node not placed");
                false
            }
            Err(idx) => {
                self.positions.insert(idx, pos);
                self.owners.insert(pos, node_id.clone());
                self.members.insert(node_id.clone());
                true
            }
        }
    }

    fn remove(&mut self, node_id: &NodeId) -> bool {
        if !self.members.remove(node_id) {
            return false;
        }

        let pos = hash_key(&node_id.0);
        if let Ok(idx) = self.positions.binary_search(&pos) {
            self.positions.remove(idx);
        }
        self.owners.remove(&pos);
        true
    }

    fn lookup(&self, key: &str) -> Option<&NodeId> {
        if self.positions.is_empty() {
            return None;
        }

        let hash = hash_key(key);
        let mut idx = self.positions.partition_point(|&p| p < hash);
        if idx == self.positions.len() {
            idx = 0;
        }

        self.owners.get(&self.positions[idx])
    }
}

/// Thread-safe consistent hash ring.
///
/// Lookups take the shared lock and never block each other; every mutating
/// sequence runs under the exclusive lock, so readers never observe
/// `positions`, the owner map and the member set out of step.
#[derive(Debug, Default)]
pub struct HashRing {
    state: RwLock<RingState>,
}

impl HashRing {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RingState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RingState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place `node_id` on the ring. Returns false if it was already present,
    /// or if a different node already holds its position (see [`Self::occupant`]).
    pub fn add_node(&self, node_id: &NodeId) -> bool {
        let added = self.write().insert(node_id);
        if added {
            debug!(node_id = %node_id, "Added node to ring");
        }
        added
    }

    /// Take `node_id` off the ring. Returns false if it was absent.
    pub fn remove_node(&self, node_id: &NodeId) -> bool {
        let removed = self.write().remove(node_id);
        if removed {
            debug!(node_id = %node_id, "Removed node from ring");
        }
        removed
    }

    /// Node responsible for `key`, or `None` when the ring is empty.
    pub fn lookup(&self, key: &str) -> Option<NodeId> {
        self.read().lookup(key).cloned()
    }

    /// Make the ring's membership equal to `desired`.
    pub fn reconcile<'a, I>(&self, desired: I) -> ReconcileOutcome
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let desired: HashSet<&NodeId> = desired.into_iter().collect();
        let mut state = self.write();

        let stale: Vec<NodeId> = state
            .members
            .iter()
            .filter(|m| !desired.contains(m))
            .cloned()
            .collect();

        let mut outcome = ReconcileOutcome::default();
        for node_id in &stale {
            if state.remove(node_id) {
                outcome.removed += 1;
            }
        }
        for node_id in desired {
            if state.insert(node_id) {
                outcome.added += 1;
            }
        }

        if !outcome.is_noop() {
            debug!(
                added = outcome.added,
                removed = outcome.removed,
                size = state.members.len(),
                "Ring reconciled"
            );
        }
        outcome
    }

    /// The other node holding the position `node_id` would take, if any.
    pub fn occupant(&self, node_id: &NodeId) -> Option<NodeId> {
        self.read()
            .owners
            .get(&hash_key(&node_id.0))
            .filter(|owner| *owner != node_id)
            .cloned()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.read().members.contains(node_id)
    }

    pub fn size(&self) -> usize {
        self.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of the current members, sorted by identifier.
    pub fn members(&self) -> Vec<NodeId> {
        let mut members: Vec<NodeId> = self.read().members.iter().cloned().collect();
        members.sort();
        members
    }

    /// Snapshot of the occupied positions in ring order.
    pub fn positions(&self) -> Vec<u32> {
        self.read().positions.clone()
    }
}
