//! Follower-side setup receiver (C4): waits for the leader's signed
//! `DKGInfo` packet and validates it before handing back the group.

use beacon_core::{BeaconError, Result};
use beacon_crypto::PublicKey;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::group::GroupDescriptor;
use crate::packets::DkgInfoPacket;

pub struct SetupReceiver {
    local_secret: Vec<u8>,
    self_address: String,
    leader_public_key: PublicKey,
    /// True for resharing, where the caller may legitimately be absent
    /// from the new group (it is leaving).
    allow_absence: bool,
    cancel: CancellationToken,
}

impl SetupReceiver {
    pub fn new(
        local_secret: Vec<u8>,
        self_address: String,
        leader_public_key: PublicKey,
        allow_absence: bool,
    ) -> Self {
        Self {
            local_secret,
            self_address,
            leader_public_key,
            allow_absence,
            cancel: CancellationToken::new(),
        }
    }

    /// Bounded wait for the leader's pushed `DKGInfo` packet. Returns an
    /// error on timeout, explicit `stop()`, or a failed validation; a
    /// packet that arrives after any of those is discarded by the caller
    /// never polling this future again.
    pub async fn wait_info(
        &self,
        info_rx: oneshot::Receiver<DkgInfoPacket>,
        wait_timeout: Duration,
    ) -> Result<GroupDescriptor> {
        tokio::select! {
            result = info_rx => {
                match result {
                    Ok(packet) => self.validate(packet),
                    Err(_) => Err(BeaconError::timeout("setup manager closed before sending DKG info")),
                }
            }
            _ = self.cancel.cancelled() => {
                Err(BeaconError::timeout("setup receiver stopped"))
            }
            _ = tokio::time::sleep(wait_timeout) => {
                Err(BeaconError::timeout("timed out waiting for DKG info"))
            }
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn validate(&self, packet: DkgInfoPacket) -> Result<GroupDescriptor> {
        if packet.secret_proof != self.local_secret {
            return Err(BeaconError::invalid("DKG info secret proof mismatch"));
        }

        let group: GroupDescriptor = bincode::deserialize(&packet.group_bytes)?;
        let hash = group.hash()?;
        self.leader_public_key
            .verify(hash.as_bytes(), &packet.leader_signature)?;

        if group.index_of(&self.self_address).is_none() && !self.allow_absence {
            return Err(BeaconError::invalid(
                "local node is not a member of the pushed group",
            ));
        }

        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{DistKeyPublic, Identity, Node, SchemeId};
    use beacon_core::{Hash32, NodeIndex};
    use beacon_crypto::LongTermKeyPair;

    fn group_with(address: &str, leader_kp: &LongTermKeyPair) -> GroupDescriptor {
        GroupDescriptor {
            nodes: vec![Node {
                index: NodeIndex(1),
                identity: Identity {
                    address: address.to_string(),
                    tls: false,
                    public_key: leader_kp.public_key(),
                },
            }],
            threshold: 1,
            period_secs: 10,
            catchup_period_secs: 5,
            genesis_time_ms: 1000,
            transition_time_ms: None,
            genesis_seed: Hash32::of(b"seed"),
            scheme: SchemeId(1),
            public_key: DistKeyPublic { coefficients: vec![] },
        }
    }

    #[tokio::test]
    async fn accepts_well_formed_packet_for_member_node() {
        let mut rng = rand::rngs::OsRng;
        let leader_kp = LongTermKeyPair::generate(&mut rng);
        let group = group_with("node1:1234", &leader_kp);
        let group_bytes = bincode::serialize(&group).unwrap();
        let signature = leader_kp.sign(group.hash().unwrap().as_bytes());

        let receiver = SetupReceiver::new(
            b"secret".to_vec(),
            "node1:1234".to_string(),
            leader_kp.public_key(),
            false,
        );
        let (tx, rx) = oneshot::channel();
        tx.send(DkgInfoPacket {
            group_bytes,
            secret_proof: b"secret".to_vec(),
            dkg_timeout_secs: 60,
            leader_signature: signature,
        })
        .unwrap();

        let received = receiver
            .wait_info(rx, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(received.hash().unwrap(), group.hash().unwrap());
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let mut rng = rand::rngs::OsRng;
        let leader_kp = LongTermKeyPair::generate(&mut rng);
        let group = group_with("node1:1234", &leader_kp);
        let group_bytes = bincode::serialize(&group).unwrap();
        let signature = leader_kp.sign(group.hash().unwrap().as_bytes());

        let receiver = SetupReceiver::new(
            b"secret".to_vec(),
            "node1:1234".to_string(),
            leader_kp.public_key(),
            false,
        );
        let (tx, rx) = oneshot::channel();
        tx.send(DkgInfoPacket {
            group_bytes,
            secret_proof: b"wrong".to_vec(),
            dkg_timeout_secs: 60,
            leader_signature: signature,
        })
        .unwrap();

        assert!(receiver.wait_info(rx, Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn times_out_when_leader_never_pushes() {
        let mut rng = rand::rngs::OsRng;
        let leader_kp = LongTermKeyPair::generate(&mut rng);
        let receiver = SetupReceiver::new(
            b"secret".to_vec(),
            "node1:1234".to_string(),
            leader_kp.public_key(),
            false,
        );
        let (_tx, rx) = oneshot::channel();
        assert!(receiver
            .wait_info(rx, Duration::from_millis(10))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn leaving_node_absence_is_tolerated_when_allowed() {
        let mut rng = rand::rngs::OsRng;
        let leader_kp = LongTermKeyPair::generate(&mut rng);
        let group = group_with("node1:1234", &leader_kp);
        let group_bytes = bincode::serialize(&group).unwrap();
        let signature = leader_kp.sign(group.hash().unwrap().as_bytes());

        let receiver = SetupReceiver::new(
            b"secret".to_vec(),
            "node-leaving:9999".to_string(),
            leader_kp.public_key(),
            true,
        );
        let (tx, rx) = oneshot::channel();
        tx.send(DkgInfoPacket {
            group_bytes,
            secret_proof: b"secret".to_vec(),
            dkg_timeout_secs: 60,
            leader_signature: signature,
        })
        .unwrap();

        receiver.wait_info(rx, Duration::from_secs(1)).await.unwrap();
    }
}
