use tonic::Code;

use cohere_core::{ClusterError, NodeId};
use cohere_node::StoreError;

#[test]
fn test_error_messages() {
    assert_eq!(
        ClusterError::NoAvailableNodes.to_string(),
        "No available database servers"
    );
    assert_eq!(
        ClusterError::AlreadyRegistered(NodeId::from("n1")).to_string(),
        "Node already registered: n1"
    );
    assert_eq!(
        ClusterError::PositionTaken {
            node: NodeId::from("a"),
            holder: NodeId::from("b"),
        }
        .to_string(),
        "Ring position of node a is held by node b"
    );
    assert_eq!(
        ClusterError::KeyNotFound("k".into()).to_string(),
        "Key not found: k"
    );
    assert_eq!(
        ClusterError::ConnectionClosed(NodeId::from("n2")).to_string(),
        "Connection to node n2 closed"
    );
}

#[test]
fn test_cluster_error_status_codes() {
    let cases = [
        (ClusterError::KeyNotFound("k".into()), Code::NotFound),
        (ClusterError::NoAvailableNodes, Code::Unavailable),
        (ClusterError::BackendUnavailable("x".into()), Code::Unavailable),
        (ClusterError::ConnectionClosed(NodeId::from("n")), Code::Unavailable),
        (ClusterError::AlreadyRegistered(NodeId::from("n")), Code::AlreadyExists),
        (
            ClusterError::PositionTaken {
                node: NodeId::from("a"),
                holder: NodeId::from("b"),
            },
            Code::AlreadyExists,
        ),
        (ClusterError::UnknownNode(NodeId::from("n")), Code::Internal),
        (ClusterError::RegistrationRejected("x".into()), Code::FailedPrecondition),
        (ClusterError::InvalidAddress("x".into()), Code::FailedPrecondition),
    ];

    for (err, code) in cases {
        let message = err.to_string();
        let status = tonic::Status::from(err);
        assert_eq!(status.code(), code, "{message}");
        assert_eq!(status.message(), message);
    }
}

#[test]
fn test_from_status_classification() {
    let err = ClusterError::from_status("user:1", tonic::Status::not_found("gone"));
    assert!(err.is_not_found());
    assert!(matches!(err, ClusterError::KeyNotFound(ref k) if k == "user:1"));

    let err = ClusterError::from_status("k", tonic::Status::unavailable("connection refused"));
    assert!(matches!(err, ClusterError::BackendUnavailable(ref m) if m == "connection refused"));

    let err = ClusterError::from_status("k", tonic::Status::deadline_exceeded("slow"));
    assert!(!err.is_not_found());
}

#[test]
fn test_store_error_status_codes() {
    let status = tonic::Status::from(StoreError::NotFound("a".into()));
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "Key not found: a");

    let status = tonic::Status::from(StoreError::Io("disk".into()));
    assert_eq!(status.code(), Code::Internal);
}

#[test]
fn test_io_failure_becomes_store_io() {
    let err = StoreError::from(std::io::Error::other("read-only filesystem"));
    assert!(matches!(err, StoreError::Io(ref msg) if msg.contains("read-only filesystem")));
    assert_eq!(tonic::Status::from(err).code(), Code::Internal);
}
