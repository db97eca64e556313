//! The pluggable DKG engine contract (§1): `NewProtocol`, phase callbacks,
//! packet signing/verification, and `WaitEnd`. The engine's own
//! verifiable-secret-sharing algebra is an external collaborator; this
//! module only defines the boundary the orchestrator (C6) and phaser (C5)
//! drive it through.

use async_trait::async_trait;
use beacon_core::{NodeIndex, Result};
use beacon_crypto::{LongTermKeyPair, Signature};
use std::sync::Arc;

use crate::group::GroupDescriptor;

/// Signs outgoing bundles and verifies incoming ones, on behalf of the
/// echo broadcaster (C2), which never holds key material itself.
pub trait PacketSigner: Send + Sync {
    fn sign(&self, payload: &[u8]) -> Signature;
    fn verify(&self, originator: NodeIndex, payload: &[u8], signature: &Signature) -> Result<()>;
}

/// A `PacketSigner` backed by a node's own long-term key and the group's
/// roster of long-term public keys.
pub struct GroupSigner {
    long_term: LongTermKeyPair,
    group: GroupDescriptor,
}

impl GroupSigner {
    pub fn new(long_term: LongTermKeyPair, group: GroupDescriptor) -> Self {
        Self { long_term, group }
    }
}

impl PacketSigner for GroupSigner {
    fn sign(&self, payload: &[u8]) -> Signature {
        self.long_term.sign(payload)
    }

    fn verify(&self, originator: NodeIndex, payload: &[u8], signature: &Signature) -> Result<()> {
        let node = self
            .group
            .node_at(originator)
            .ok_or_else(|| beacon_core::BeaconError::invalid("unknown originator index"))?;
        node.identity.public_key.verify(payload, signature)
    }
}

/// The engine's view of the network: push outgoing bundles, keyed by kind.
/// `EchoBroadcaster` (C2) is the blessed implementation.
#[async_trait]
pub trait Board: Send + Sync {
    async fn push_deal(&self, payload: Vec<u8>) -> Result<()>;
    async fn push_response(&self, payload: Vec<u8>) -> Result<()>;
    async fn push_justification(&self, payload: Vec<u8>) -> Result<()>;
}

/// Outcome of a completed DKG/reshare run.
#[derive(Clone)]
pub struct DkgOutcome {
    /// Opaque secret share bytes; never logged, persisted only on success.
    pub share: Vec<u8>,
    pub public_key: crate::group::DistKeyPublic,
}

/// Configuration handed to [`DkgEngine::new_protocol`].
pub struct DkgEngineConfig {
    pub new_group: GroupDescriptor,
    pub old_group: Option<GroupDescriptor>,
    pub old_threshold: Option<u32>,
    pub is_leader: bool,
    pub fast_sync: bool,
}

/// A running DKG/reshare protocol instance, driven by the phaser (C5).
#[async_trait]
pub trait DkgProtocol: Send + Sync {
    async fn handle_deal(&mut self, from: NodeIndex, payload: Vec<u8>) -> Result<()>;
    async fn handle_response(&mut self, from: NodeIndex, payload: Vec<u8>) -> Result<()>;
    async fn handle_justification(&mut self, from: NodeIndex, payload: Vec<u8>) -> Result<()>;

    /// Phase callback: true once the engine has received enough packets
    /// for the current phase, letting the phaser advance ahead of the
    /// per-phase timeout ("fast sync").
    fn phase_ready(&self) -> bool;

    /// `WaitEnd`: block until the protocol reaches a terminal state,
    /// success or failure.
    async fn wait_end(&mut self) -> Result<DkgOutcome>;
}

/// The pluggable DKG engine: constructs protocol instances bound to a
/// board and configuration (`NewProtocol`).
pub trait DkgEngine: Send + Sync {
    fn new_protocol(
        &self,
        config: DkgEngineConfig,
        board: Arc<dyn Board>,
    ) -> Result<Box<dyn DkgProtocol>>;
}
