//! Info push (C7): best-effort, threshold-quorum dissemination of the
//! signed group descriptor to every participant of both the outgoing and
//! incoming group.

use async_trait::async_trait;
use beacon_core::{BeaconError, Result};
use beacon_crypto::LongTermKeyPair;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::group::GroupDescriptor;
use crate::packets::DkgInfoPacket;

/// Sends the assembled `DKGInfo` packet to one peer. Implemented by the
/// RPC substrate; errors are peer failures, not fatal to the push.
#[async_trait]
pub trait InfoPusher: Send + Sync {
    async fn push_dkg_info(&self, peer_address: &str, packet: DkgInfoPacket) -> Result<()>;
}

/// Default grace period before the push is declared failed, per §4.7.
pub const PUSH_GRACE: Duration = Duration::from_secs(60);

/// Push the signed group descriptor to every member of `outgoing ∪
/// incoming` (excluding `self_address`), tracking two independent
/// decrementing quorum counters. Returns `Ok` once both counters reach
/// zero within the grace period (success, even with stragglers) or once
/// every response has arrived and both counters reached zero; returns an
/// error otherwise.
pub async fn push_dkg_info(
    self_address: &str,
    self_long_term: &LongTermKeyPair,
    outgoing: &GroupDescriptor,
    incoming: &GroupDescriptor,
    dkg_timeout_secs: u64,
    secret_proof: Vec<u8>,
    pusher: Arc<dyn InfoPusher>,
) -> Result<()> {
    let group_bytes = bincode::serialize(incoming).map_err(BeaconError::from)?;
    let leader_signature = self_long_term.sign(incoming.hash()?.as_bytes());
    let packet = DkgInfoPacket {
        group_bytes,
        secret_proof,
        dkg_timeout_secs,
        leader_signature,
    };

    let outgoing_addresses: HashSet<String> = outgoing
        .nodes
        .iter()
        .map(|n| n.identity.address.clone())
        .filter(|addr| addr != self_address)
        .collect();
    let incoming_addresses: HashSet<String> = incoming
        .nodes
        .iter()
        .map(|n| n.identity.address.clone())
        .filter(|addr| addr != self_address)
        .collect();

    let mut targets: Vec<String> = outgoing_addresses.union(&incoming_addresses).cloned().collect();
    targets.sort();

    // Each counter starts at the side's threshold, minus one if self is a
    // member of that side (self trivially counts toward its own
    // threshold without needing an ack). The two counters are
    // independent, so self being in both sides decrements each only
    // once, not twice.
    let self_in_outgoing = outgoing.index_of(self_address).is_some();
    let self_in_incoming = incoming.index_of(self_address).is_some();
    let mut prev_thr = outgoing.threshold as i64 - i64::from(self_in_outgoing);
    let mut new_thr = incoming.threshold as i64 - i64::from(self_in_incoming);

    let mut workers = JoinSet::new();
    for address in &targets {
        let pusher = pusher.clone();
        let address = address.clone();
        let packet = packet.clone();
        workers.spawn(async move {
            let result = pusher.push_dkg_info(&address, packet).await;
            (address, result)
        });
    }

    let deadline = tokio::time::sleep(PUSH_GRACE);
    tokio::pin!(deadline);
    let mut remaining = targets.len();

    loop {
        if prev_thr <= 0 && new_thr <= 0 {
            info!("push-DKG-info quorum satisfied on both sides");
            workers.abort_all();
            return Ok(());
        }
        if remaining == 0 {
            break;
        }

        tokio::select! {
            biased;

            joined = workers.join_next() => {
                match joined {
                    Some(Ok((address, Ok(())))) => {
                        remaining -= 1;
                        if outgoing_addresses.contains(&address) {
                            prev_thr -= 1;
                        }
                        if incoming_addresses.contains(&address) {
                            new_thr -= 1;
                        }
                    }
                    Some(Ok((address, Err(err)))) => {
                        remaining -= 1;
                        warn!(address, error = %err, "push-DKG-info peer send failed");
                    }
                    Some(Err(_join_err)) => {
                        remaining -= 1;
                    }
                    None => break,
                }
            }
            _ = &mut deadline => {
                break;
            }
        }
    }

    if prev_thr <= 0 && new_thr <= 0 {
        info!("push-DKG-info quorum satisfied before grace period elapsed");
        Ok(())
    } else {
        Err(BeaconError::peer_failure(format!(
            "push-DKG-info quorum unsatisfied: prev_thr={prev_thr} new_thr={new_thr}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{DistKeyPublic, Identity, Node, SchemeId};
    use beacon_core::{Hash32, NodeIndex};
    use parking_lot::Mutex as SyncMutex;
    use std::collections::BTreeSet;

    fn node(index: u32, address: &str, kp: &LongTermKeyPair) -> Node {
        Node {
            index: NodeIndex(index),
            identity: Identity { address: address.to_string(), tls: false, public_key: kp.public_key() },
        }
    }

    fn descriptor(nodes: Vec<Node>, threshold: u32) -> GroupDescriptor {
        GroupDescriptor {
            nodes,
            threshold,
            period_secs: 1,
            catchup_period_secs: 1,
            genesis_time_ms: 0,
            transition_time_ms: None,
            genesis_seed: Hash32::of(b"seed"),
            scheme: SchemeId(1),
            public_key: DistKeyPublic { coefficients: vec![] },
        }
    }

    struct AlwaysOk {
        seen: SyncMutex<BTreeSet<String>>,
    }

    #[async_trait]
    impl InfoPusher for AlwaysOk {
        async fn push_dkg_info(&self, peer_address: &str, _packet: DkgInfoPacket) -> Result<()> {
            self.seen.lock().insert(peer_address.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn succeeds_once_both_thresholds_are_met() {
        let mut rng = rand::rngs::OsRng;
        let leader = LongTermKeyPair::generate(&mut rng);
        let others: Vec<LongTermKeyPair> = (0..4).map(|_| LongTermKeyPair::generate(&mut rng)).collect();

        let outgoing = descriptor(
            vec![
                node(1, "leader:1", &leader),
                node(2, "n2:1", &others[0]),
                node(3, "n3:1", &others[1]),
            ],
            2,
        );
        let incoming = descriptor(
            vec![
                node(1, "leader:1", &leader),
                node(2, "n2:1", &others[0]),
                node(3, "n4:1", &others[2]),
                node(4, "n5:1", &others[3]),
            ],
            3,
        );

        let pusher = Arc::new(AlwaysOk { seen: SyncMutex::new(BTreeSet::new()) });
        push_dkg_info(
            "leader:1",
            &leader,
            &outgoing,
            &incoming,
            60,
            b"secret".to_vec(),
            pusher.clone(),
        )
        .await
        .unwrap();
    }

    struct AlwaysFail;

    #[async_trait]
    impl InfoPusher for AlwaysFail {
        async fn push_dkg_info(&self, _peer_address: &str, _packet: DkgInfoPacket) -> Result<()> {
            Err(BeaconError::peer_failure("unreachable"))
        }
    }

    #[tokio::test]
    async fn fails_when_no_peer_ever_acks() {
        let mut rng = rand::rngs::OsRng;
        let leader = LongTermKeyPair::generate(&mut rng);
        let other = LongTermKeyPair::generate(&mut rng);
        let outgoing = descriptor(vec![node(1, "leader:1", &leader), node(2, "n2:1", &other)], 2);
        let incoming = outgoing.clone();

        let result = push_dkg_info(
            "leader:1",
            &leader,
            &outgoing,
            &incoming,
            1,
            b"secret".to_vec(),
            Arc::new(AlwaysFail),
        )
        .await;
        assert!(result.is_err());
    }
}
