//! A harness node wired through the full `Orchestrator`, for
//! end-to-end DKG/reshare scenarios rather than bare broadcast-layer ones.

use async_trait::async_trait;
use beacon_core::{Clock, Result};
use beacon_crypto::LongTermKeyPair;
use beacon_protocol::packets::{DkgInfoPacket, DkgPacket};
use beacon_protocol::{
    DkgEngine, Identity, KeyStore, MemoryKeyStore, MemoryShareStore, Orchestrator, ShareStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::network::Inbox;

pub struct OrchestratorNode {
    pub identity: Identity,
    pub long_term: LongTermKeyPair,
    pub orchestrator: Arc<Orchestrator>,
    share_store: Arc<dyn ShareStore>,
    pending_info: Mutex<Option<oneshot::Sender<DkgInfoPacket>>>,
}

impl OrchestratorNode {
    pub fn new(
        address: &str,
        long_term: LongTermKeyPair,
        engine: Arc<dyn DkgEngine>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let identity = Identity { address: address.to_string(), tls: false, public_key: long_term.public_key() };
        let key_store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new(long_term.clone()));
        let share_store: Arc<dyn ShareStore> = Arc::new(MemoryShareStore::new());
        let orchestrator = Arc::new(Orchestrator::new(engine, key_store, share_store.clone(), clock));
        Arc::new(Self {
            identity,
            long_term,
            orchestrator,
            share_store,
            pending_info: Mutex::new(None),
        })
    }

    /// The share persisted by the most recently completed DKG/reshare on
    /// this node, if any.
    pub async fn persisted_share(&self) -> Option<Vec<u8>> {
        self.share_store.get().await.ok().flatten().map(|p| p.share)
    }

    /// Registers an expectation for an incoming `DKGInfo` packet; returns
    /// the receiver half to pass into `Orchestrator::run_fresh_dkg_follower`
    /// / `run_reshare_follower`.
    pub fn expect_dkg_info(&self) -> oneshot::Receiver<DkgInfoPacket> {
        let (tx, rx) = oneshot::channel();
        *self.pending_info.lock() = Some(tx);
        rx
    }
}

#[async_trait]
impl Inbox for OrchestratorNode {
    async fn receive_dkg_packet(&self, packet: DkgPacket) -> Result<()> {
        self.orchestrator.deliver_dkg_packet(packet).await
    }

    async fn receive_dkg_info(&self, packet: DkgInfoPacket) -> Result<()> {
        if let Some(tx) = self.pending_info.lock().take() {
            let _ = tx.send(packet);
        }
        Ok(())
    }
}
