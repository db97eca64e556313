//! A harness node: wires an `EchoBroadcaster` (and, for setup-level
//! tests, a pending DKG-info slot) into an `InMemoryNetwork`.

use async_trait::async_trait;
use beacon_core::{NodeIndex, Result};
use beacon_crypto::LongTermKeyPair;
use beacon_protocol::packets::{DkgInfoPacket, DkgPacket};
use beacon_protocol::{EchoBroadcaster, GroupDescriptor, GroupSigner, Identity, PacketSigner};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::network::{Inbox, InMemoryNetwork};

pub struct TestNode {
    pub identity: Identity,
    pub long_term: LongTermKeyPair,
    broadcaster: Mutex<Option<Arc<EchoBroadcaster>>>,
    pending_info: Mutex<Option<oneshot::Sender<DkgInfoPacket>>>,
}

impl TestNode {
    pub fn new(address: &str, long_term: LongTermKeyPair) -> Arc<Self> {
        let identity = Identity { address: address.to_string(), tls: false, public_key: long_term.public_key() };
        Arc::new(Self {
            identity,
            long_term,
            broadcaster: Mutex::new(None),
            pending_info: Mutex::new(None),
        })
    }

    /// Installs a fresh broadcaster for a new DKG/reshare session bound to
    /// `group`, and returns its deal/response/justification receivers.
    pub fn install_broadcaster(
        self: &Arc<Self>,
        self_index: NodeIndex,
        group: GroupDescriptor,
        network: Arc<InMemoryNetwork>,
    ) -> Arc<EchoBroadcaster> {
        let signer: Arc<dyn PacketSigner> = Arc::new(GroupSigner::new(self.long_term.clone(), group.clone()));
        let broadcaster = Arc::new(EchoBroadcaster::new(self_index, group, signer, network));
        *self.broadcaster.lock() = Some(broadcaster.clone());
        broadcaster
    }

    /// Registers an expectation for an incoming `DKGInfo` packet; returns
    /// the receiver half a `SetupReceiver::wait_info` call can await.
    pub fn expect_dkg_info(&self) -> oneshot::Receiver<DkgInfoPacket> {
        let (tx, rx) = oneshot::channel();
        *self.pending_info.lock() = Some(tx);
        rx
    }
}

#[async_trait]
impl Inbox for TestNode {
    async fn receive_dkg_packet(&self, packet: DkgPacket) -> Result<()> {
        let broadcaster = self.broadcaster.lock().clone();
        match broadcaster {
            Some(broadcaster) => broadcaster.receive(packet).await,
            None => Ok(()),
        }
    }

    async fn receive_dkg_info(&self, packet: DkgInfoPacket) -> Result<()> {
        if let Some(tx) = self.pending_info.lock().take() {
            let _ = tx.send(packet);
        }
        Ok(())
    }
}
