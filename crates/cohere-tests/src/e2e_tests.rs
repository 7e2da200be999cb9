use std::collections::HashMap;
use std::time::Duration;

use axum::http::StatusCode;
use tower::ServiceExt;

use cohere_cluster::HashRing;
use cohere_cluster::ring::hash_key;
use cohere_core::{ClusterError, NodeId};
use cohere_manager::rest::build_router;
use cohere_node::KvStore;

use crate::helpers::{TestNode, parse_response_json, post_json, random_keys, test_registry};

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

async fn register_via_rest(app: &axum::Router, region: &str, grpc_addr: &str) -> NodeId {
    let response = app
        .clone()
        .oneshot(post_json(
            "/register",
            serde_json::json!({ "region": region, "grpc_addr": grpc_addr }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = parse_response_json(response).await;
    NodeId::from(json["server_uuid"].as_str().unwrap())
}

#[tokio::test]
async fn test_register_route_evict_recover() {
    let registry = test_registry();
    let app = build_router(registry.clone(), None);

    let node_a = TestNode::start().await;
    let id_a = register_via_rest(&app, "us-east", &node_a.address()).await;

    assert!(registry.set_key("session:42", "token").await.unwrap());
    assert_eq!(registry.get_key("session:42").await.unwrap(), "token");
    assert_eq!(node_a.store.get("session:42").unwrap(), "token");

    node_a.stop().await;

    for sweep in 1..=2 {
        let report = registry.health_check_servers(PROBE_TIMEOUT, 3).await;
        assert!(report.evicted.is_empty(), "evicted early on sweep {sweep}");
        assert!(registry.contains(&id_a));
    }
    let report = registry.health_check_servers(PROBE_TIMEOUT, 3).await;
    assert_eq!(report.evicted, vec![id_a.clone()]);
    assert!(!registry.contains(&id_a));

    assert!(matches!(
        registry.get_key("session:42").await,
        Err(ClusterError::NoAvailableNodes)
    ));

    let node_b = TestNode::start().await;
    let id_b = register_via_rest(&app, "us-east", &node_b.address()).await;
    assert_ne!(id_a, id_b);

    // Data on the evicted node is gone; new writes land on B.
    assert!(registry.get_key("session:42").await.unwrap_err().is_not_found());
    assert!(registry.set_key("session:42", "fresh").await.unwrap());
    assert_eq!(node_b.store.get("session:42").unwrap(), "fresh");

    node_b.stop().await;
}

#[tokio::test]
async fn test_eviction_reroutes_to_survivor() {
    let registry = test_registry();
    let node_a = TestNode::start().await;
    let node_b = TestNode::start().await;
    let id_a = NodeId::from("node-a");
    let id_b = NodeId::from("node-b");
    registry.add_server(id_a.clone(), "r", &node_a.address()).unwrap();
    registry.add_server(id_b.clone(), "r", &node_b.address()).unwrap();

    let keys = random_keys(50);
    let on_a: Vec<&String> = keys
        .iter()
        .filter(|k| registry.owner_of(k) == Some(id_a.clone()))
        .collect();
    assert!(!on_a.is_empty());

    node_a.stop().await;
    let report = registry.health_check_servers(PROBE_TIMEOUT, 1).await;
    assert_eq!(report.evicted, vec![id_a]);

    for key in on_a {
        assert_eq!(registry.owner_of(key), Some(id_b.clone()));
        assert!(registry.set_key(key, "moved").await.unwrap());
    }

    node_b.stop().await;
}

/// Fraction of the hash space owned by each member: the arc ending at its
/// position.
fn arc_fractions(ring: &HashRing) -> HashMap<NodeId, f64> {
    let members = ring.members();
    let mut by_pos: Vec<(u32, NodeId)> = members.into_iter().map(|m| (hash_key(&m.0), m)).collect();
    by_pos.sort();

    let space = (u32::MAX as f64) + 1.0;
    let mut fractions = HashMap::new();
    for (i, (pos, id)) in by_pos.iter().enumerate() {
        let prev = if i == 0 { by_pos[by_pos.len() - 1].0 } else { by_pos[i - 1].0 };
        let arc = if by_pos.len() == 1 { space } else { pos.wrapping_sub(prev) as f64 };
        fractions.insert(id.clone(), arc / space);
    }
    fractions
}

fn route_counts(ring: &HashRing, keys: &[String]) -> HashMap<NodeId, usize> {
    let mut counts = HashMap::new();
    for key in keys {
        *counts.entry(ring.lookup(key).unwrap()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_two_evenly_spaced_nodes_split_keys() {
    let first = NodeId::from("node-0");
    let first_pos = hash_key(&first.0);
    let second = (1..100_000)
        .map(|i| NodeId::from(format!("node-{i}")))
        .find(|id| {
            let gap = hash_key(&id.0).wrapping_sub(first_pos) as f64 / (u32::MAX as f64 + 1.0);
            (0.48..=0.52).contains(&gap)
        })
        .expect("an id roughly opposite node-0");

    let ring = HashRing::new();
    ring.add_node(&first);
    ring.add_node(&second);

    let keys = random_keys(10_000);
    let counts = route_counts(&ring, &keys);
    for id in [&first, &second] {
        let share = counts.get(id).copied().unwrap_or(0) as f64 / keys.len() as f64;
        assert!((0.44..=0.56).contains(&share), "{id} got {share}");
    }
}

#[test]
fn test_key_share_tracks_arc_length() {
    let ring = HashRing::new();
    for _ in 0..5 {
        ring.add_node(&NodeId::new());
    }

    let keys = random_keys(20_000);
    let counts = route_counts(&ring, &keys);
    let expected = arc_fractions(&ring);

    for (id, fraction) in expected {
        let share = counts.get(&id).copied().unwrap_or(0) as f64 / keys.len() as f64;
        assert!(
            (share - fraction).abs() < 0.03,
            "{id}: routed {share:.4}, arc {fraction:.4}"
        );
    }
}
