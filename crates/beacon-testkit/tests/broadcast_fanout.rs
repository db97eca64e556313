//! S3 — broadcast fan-out: 5 fully-connected nodes, one originated deal
//! bundle should reach exactly 5 x 4 = 20 incoming `BroadcastDKG` calls,
//! re-broadcasting the same bundle adds zero, and four more originations
//! add 5 x 4 x 4 = 80 further deliveries.

use beacon_core::{Hash32, NodeIndex};
use beacon_crypto::LongTermKeyPair;
use beacon_protocol::{
    packets::BundleKind, DistKeyPublic, GroupDescriptor, Identity, Node, SchemeId,
};
use beacon_testkit::{InMemoryNetwork, TestNode};
use std::sync::Arc;

fn five_node_group(nodes: &[Arc<TestNode>]) -> GroupDescriptor {
    GroupDescriptor {
        nodes: nodes
            .iter()
            .enumerate()
            .map(|(i, node)| Node { index: NodeIndex(i as u32 + 1), identity: node.identity.clone() })
            .collect(),
        threshold: 3,
        period_secs: 1,
        catchup_period_secs: 1,
        genesis_time_ms: 0,
        transition_time_ms: None,
        genesis_seed: Hash32::of(b"genesis"),
        scheme: SchemeId(1),
        public_key: DistKeyPublic { coefficients: vec![] },
    }
}

#[tokio::test]
async fn five_node_fan_out_matches_the_literal_scenario() {
    let mut rng = rand::rngs::OsRng;
    let network = InMemoryNetwork::new();

    let nodes: Vec<Arc<TestNode>> = (0..5)
        .map(|i| {
            let kp = LongTermKeyPair::generate(&mut rng);
            let node = TestNode::new(&format!("node{i}:1000"), kp);
            network.register(&node.identity.address, node.clone());
            node
        })
        .collect();

    let group = five_node_group(&nodes);

    let broadcasters: Vec<_> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| node.install_broadcaster(NodeIndex(i as u32 + 1), group.clone(), network.clone()))
        .collect();

    broadcasters[0].push(BundleKind::Deal, b"deal-from-node-0".to_vec()).await.unwrap();
    // Allow the fan-out tasks (spawned via JoinSet inside push/receive) to
    // settle before asserting totals.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(network.total_dkg_packet_sends(), 20);

    // Node 0 re-broadcasting the identical bundle must not add anything.
    broadcasters[0].push(BundleKind::Deal, b"deal-from-node-0".to_vec()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(network.total_dkg_packet_sends(), 20, "re-push of an identical bundle must dedup");

    for broadcaster in &broadcasters[1..] {
        broadcaster.push(BundleKind::Deal, b"a fresh deal".to_vec()).await.unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(network.total_dkg_packet_sends(), 20 + 80);
}
