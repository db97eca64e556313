//! S1 — fresh DKG: a leader and four followers run a fresh DKG together
//! through the real `Orchestrator`/`SetupManager`/`EchoBroadcaster` wiring
//! and converge on one signed group descriptor, each node persisting its
//! own share.

use beacon_core::{Clock, NodeIndex};
use beacon_crypto::LongTermKeyPair;
use beacon_protocol::orchestrator::{declared_params, SessionConfig};
use beacon_protocol::{DkgEngine, GroupDescriptor, Identity, InfoPusher, PeerSender, SchemeId};
use beacon_testkit::{FakeClock, FakeDkgEngine, InMemoryNetwork, OrchestratorNode};
use std::sync::Arc;
use std::time::Duration;

const EXPECTED_COUNT: u32 = 5;
const THRESHOLD: u32 = 3;
const PER_PHASE_TIMEOUT: Duration = Duration::from_secs(5);
const PERIOD_SECS: u64 = 30;
const CATCHUP_PERIOD_SECS: u64 = 10;

fn session_config(self_identity: Identity, is_leader: bool, shared_secret: Vec<u8>) -> SessionConfig {
    SessionConfig {
        self_identity,
        is_leader,
        expected_count: EXPECTED_COUNT,
        threshold: THRESHOLD,
        per_phase_timeout: PER_PHASE_TIMEOUT,
        period_secs: PERIOD_SECS,
        catchup_period_secs: CATCHUP_PERIOD_SECS,
        shared_secret,
        start_in: Duration::from_millis(10),
        scheme: SchemeId(1),
        force: false,
    }
}

#[tokio::test]
async fn five_node_fresh_dkg_converges_on_one_group() {
    let mut rng = rand::rngs::OsRng;
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(1_000_000));
    let engine: Arc<dyn DkgEngine> = Arc::new(FakeDkgEngine);
    let network = InMemoryNetwork::new();
    let shared_secret = b"s1-shared-secret".to_vec();

    let leader = OrchestratorNode::new("leader:9000", LongTermKeyPair::generate(&mut rng), engine.clone(), clock.clone());
    network.register(&leader.identity.address, leader.clone());

    let followers: Vec<_> = (0..4)
        .map(|i| {
            let node = OrchestratorNode::new(
                &format!("follower{i}:9000"),
                LongTermKeyPair::generate(&mut rng),
                engine.clone(),
                clock.clone(),
            );
            network.register(&node.identity.address, node.clone());
            node
        })
        .collect();

    let leader_o = leader.orchestrator.clone();
    let leader_config = session_config(leader.identity.clone(), true, shared_secret.clone());
    let leader_peer_sender: Arc<dyn PeerSender> = network.clone();
    let leader_info_pusher: Arc<dyn InfoPusher> = network.clone();
    let leader_task = tokio::spawn(async move {
        leader_o.run_fresh_dkg_leader(leader_config, leader_peer_sender, leader_info_pusher).await
    });

    let mut follower_tasks = Vec::new();
    for follower in &followers {
        let info_rx = follower.expect_dkg_info();
        let follower_o = follower.orchestrator.clone();
        let config = session_config(follower.identity.clone(), false, shared_secret.clone());
        let leader_public_key = leader.identity.public_key;
        let peer_sender: Arc<dyn PeerSender> = network.clone();
        follower_tasks.push(tokio::spawn(async move {
            follower_o.run_fresh_dkg_follower(config, leader_public_key, info_rx, peer_sender).await
        }));
    }

    // Stands in for each follower's `signal_dkg_participant` RPC reaching
    // the leader. Retried because the leader's `SetupManager` isn't
    // published into its orchestrator state until the spawned leader task
    // above actually starts running, and scheduling order isn't guaranteed.
    for follower in &followers {
        let mut registered = false;
        for _ in 0..50 {
            match leader.orchestrator.register_participant(
                follower.identity.clone(),
                &shared_secret,
                declared_params(EXPECTED_COUNT, THRESHOLD, PER_PHASE_TIMEOUT.as_secs()),
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

    let leader_group: GroupDescriptor = leader_task.await.unwrap().unwrap();
    let mut follower_groups = Vec::new();
    for task in follower_tasks {
        follower_groups.push(task.await.unwrap().unwrap());
    }

    assert_eq!(leader_group.len(), 5);
    for group in &follower_groups {
        assert_eq!(group.hash().unwrap(), leader_group.hash().unwrap());
    }

    assert_eq!(leader.orchestrator.current_index(), Some(NodeIndex(1)));
    assert_eq!(leader_group.index_of(&leader.identity.address), Some(NodeIndex(1)));
    for (i, follower) in followers.iter().enumerate() {
        assert_eq!(
            leader_group.index_of(&follower.identity.address),
            Some(NodeIndex(i as u32 + 2)),
            "followers are indexed in registration order"
        );
    }

    assert!(leader.persisted_share().await.is_some());
    for follower in &followers {
        assert!(follower.persisted_share().await.is_some(), "every follower must persist its share");
    }
}
