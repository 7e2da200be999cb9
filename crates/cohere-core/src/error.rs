use thiserror::Error;

use crate::types::NodeId;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Node already registered: {0}")]
    AlreadyRegistered(NodeId),

    #[error("Ring position of node {node} is held by node {holder}")]
    PositionTaken { node: NodeId, holder: NodeId },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("No available database servers")]
    NoAvailableNodes,

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("Connection to node {0} closed")]
    ConnectionClosed(NodeId),

    #[error("Invalid node address: {0}")]
    InvalidAddress(String),
}

impl ClusterError {
    /// Classify a status returned by a storage node for `key`.
    pub fn from_status(key: &str, status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::NotFound => ClusterError::KeyNotFound(key.to_string()),
            _ => ClusterError::BackendUnavailable(status.message().to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::KeyNotFound(_))
    }
}

impl From<ClusterError> for tonic::Status {
    fn from(err: ClusterError) -> Self {
        match &err {
            ClusterError::KeyNotFound(_) => tonic::Status::not_found(err.to_string()),
            ClusterError::NoAvailableNodes
            | ClusterError::BackendUnavailable(_)
            | ClusterError::ConnectionClosed(_) => tonic::Status::unavailable(err.to_string()),
            ClusterError::AlreadyRegistered(_) | ClusterError::PositionTaken { .. } => {
                tonic::Status::already_exists(err.to_string())
            }
            ClusterError::UnknownNode(_) => tonic::Status::internal(err.to_string()),
            ClusterError::RegistrationRejected(_) | ClusterError::InvalidAddress(_) => {
                tonic::Status::failed_precondition(err.to_string())
            }
        }
    }
}
