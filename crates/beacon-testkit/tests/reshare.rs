//! S4 — resharing: an old 4-node group reshares into a new 4-node group
//! where one member has gone offline and a new member joins, preserving
//! genesis time/period/seed and scheduling a future transition.

use beacon_core::{Clock, Hash32, NodeIndex};
use beacon_crypto::LongTermKeyPair;
use beacon_protocol::orchestrator::{declared_params, SessionConfig};
use beacon_protocol::{
    DistKeyPublic, DkgEngine, GroupDescriptor, Identity, InfoPusher, Node, PeerSender, SchemeId,
};
use beacon_testkit::{FakeClock, FakeDkgEngine, InMemoryNetwork, OrchestratorNode};
use std::sync::Arc;
use std::time::Duration;

const PER_PHASE_TIMEOUT: Duration = Duration::from_secs(5);
const START_IN: Duration = Duration::from_secs(5);

fn identity(address: &str, rng: &mut rand::rngs::OsRng) -> (Identity, LongTermKeyPair) {
    let kp = LongTermKeyPair::generate(rng);
    (Identity { address: address.to_string(), tls: false, public_key: kp.public_key() }, kp)
}

fn session_config(self_identity: Identity, is_leader: bool, shared_secret: Vec<u8>) -> SessionConfig {
    SessionConfig {
        self_identity,
        is_leader,
        expected_count: 4,
        threshold: 3,
        per_phase_timeout: PER_PHASE_TIMEOUT,
        period_secs: 10,
        catchup_period_secs: 5,
        shared_secret,
        start_in: START_IN,
        scheme: SchemeId(1),
        force: false,
    }
}

#[tokio::test]
async fn reshare_drops_an_offline_member_and_admits_a_new_one() {
    let mut rng = rand::rngs::OsRng;
    let clock = Arc::new(FakeClock::new(1_000_000));
    let engine: Arc<dyn DkgEngine> = Arc::new(FakeDkgEngine);
    let network = InMemoryNetwork::new();
    let shared_secret = b"s4-shared-secret".to_vec();

    let (leader_identity, leader_kp) = identity("leader:9100", &mut rng);
    let (b_identity, b_kp) = identity("nodeB:9100", &mut rng);
    let (c_identity, c_kp) = identity("nodeC:9100", &mut rng);
    let (d_identity, _d_kp) = identity("nodeD-offline:9100", &mut rng);
    let (e_identity, e_kp) = identity("nodeE:9100", &mut rng);

    let old_group = GroupDescriptor {
        nodes: vec![
            Node { index: NodeIndex(1), identity: leader_identity.clone() },
            Node { index: NodeIndex(2), identity: b_identity.clone() },
            Node { index: NodeIndex(3), identity: c_identity.clone() },
            Node { index: NodeIndex(4), identity: d_identity.clone() },
        ],
        threshold: 3,
        period_secs: 10,
        catchup_period_secs: 5,
        genesis_time_ms: 500_000,
        transition_time_ms: None,
        genesis_seed: Hash32::of(b"s4-genesis"),
        scheme: SchemeId(1),
        public_key: DistKeyPublic { coefficients: vec![] },
    };

    // nodeD never registers a harness node or an inbox: it is offline for
    // the whole reshare, reachable by neither the push nor the broadcaster.
    let leader = OrchestratorNode::new("leader:9100", leader_kp, engine.clone(), clock.clone());
    let node_b = OrchestratorNode::new("nodeB:9100", b_kp, engine.clone(), clock.clone());
    let node_c = OrchestratorNode::new("nodeC:9100", c_kp, engine.clone(), clock.clone());
    let node_e = OrchestratorNode::new("nodeE:9100", e_kp, engine.clone(), clock.clone());
    for node in [&leader, &node_b, &node_c, &node_e] {
        network.register(&node.identity.address, node.clone());
    }

    let leader_o = leader.orchestrator.clone();
    let leader_config = session_config(leader_identity.clone(), true, shared_secret.clone());
    let leader_peer_sender: Arc<dyn PeerSender> = network.clone();
    let leader_info_pusher: Arc<dyn InfoPusher> = network.clone();
    let old_group_for_leader = old_group.clone();
    let leader_task = tokio::spawn(async move {
        leader_o
            .run_reshare_leader(leader_config, old_group_for_leader.clone(), old_group_for_leader.threshold, leader_peer_sender, leader_info_pusher)
            .await
    });

    let followers = [(&node_b, b_identity.clone()), (&node_c, c_identity.clone()), (&node_e, e_identity.clone())];
    let mut follower_tasks = Vec::new();
    for (node, node_identity) in &followers {
        let info_rx = node.expect_dkg_info();
        let follower_o = node.orchestrator.clone();
        let config = session_config(node_identity.clone(), false, shared_secret.clone());
        let leader_public_key = leader_identity.public_key;
        let peer_sender: Arc<dyn PeerSender> = network.clone();
        let old_group_for_follower = old_group.clone();
        follower_tasks.push(tokio::spawn(async move {
            follower_o
                .run_reshare_follower(config, old_group_for_follower.clone(), old_group_for_follower.threshold, leader_public_key, info_rx, peer_sender)
                .await
        }));
    }

    for (_, node_identity) in &followers {
        let mut registered = false;
        for _ in 0..50 {
            match leader.orchestrator.register_participant(
                node_identity.clone(),
                &shared_secret,
                declared_params(4, 3, PER_PHASE_TIMEOUT.as_secs()),
            ) {
                Ok(()) => {
                    registered = true;
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        assert!(registered, "follower never managed to register with the leader");
    }

    let new_group: GroupDescriptor = leader_task.await.unwrap().unwrap();
    let mut follower_groups = Vec::new();
    for task in follower_tasks {
        follower_groups.push(task.await.unwrap().unwrap());
    }

    assert_eq!(new_group.len(), 4);
    for group in &follower_groups {
        assert_eq!(group.hash().unwrap(), new_group.hash().unwrap());
    }

    assert!(new_group.index_of(&d_identity.address).is_none(), "the offline member must be dropped");
    assert!(new_group.index_of(&e_identity.address).is_some(), "the joining member must be admitted");
    assert!(new_group.index_of(&leader_identity.address).is_some());
    assert!(new_group.index_of(&b_identity.address).is_some());
    assert!(new_group.index_of(&c_identity.address).is_some());

    assert_eq!(new_group.genesis_time_ms, old_group.genesis_time_ms);
    assert_eq!(new_group.period_secs, old_group.period_secs);
    assert_eq!(new_group.genesis_seed, old_group.genesis_seed);
    assert_eq!(new_group.scheme, old_group.scheme);
    assert!(
        new_group.transition_time_ms.expect("reshare must set a transition time") > clock.now_ms(),
        "transition time must be strictly in the future"
    );

    assert!(leader.persisted_share().await.is_some());
    assert!(node_b.persisted_share().await.is_some());
    assert!(node_c.persisted_share().await.is_some());
    assert!(node_e.persisted_share().await.is_some());
}
