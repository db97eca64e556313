//! An in-process stand-in for the RPC substrate: routes `PeerSender`,
//! `InfoPusher`, and `ReachabilityProbe` calls directly to a registered
//! peer's handler rather than over a real transport.

use async_trait::async_trait;
use beacon_core::Result;
use beacon_protocol::packets::{DkgInfoPacket, DkgPacket};
use beacon_protocol::{InfoPusher, PeerSender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A node's inbound handlers, registered with the network so other
/// nodes' outbound calls can reach it.
#[async_trait]
pub trait Inbox: Send + Sync {
    async fn receive_dkg_packet(&self, packet: DkgPacket) -> Result<()>;
    async fn receive_dkg_info(&self, packet: DkgInfoPacket) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryNetwork {
    peers: RwLock<HashMap<String, Arc<dyn Inbox>>>,
    dkg_packet_sends: AtomicUsize,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, address: &str, inbox: Arc<dyn Inbox>) {
        self.peers.write().insert(address.to_string(), inbox);
    }

    pub fn unregister(&self, address: &str) {
        self.peers.write().remove(address);
    }

    fn lookup(&self, address: &str) -> Option<Arc<dyn Inbox>> {
        self.peers.read().get(address).cloned()
    }

    /// Total `BroadcastDKG`-equivalent calls delivered since construction,
    /// for asserting fan-out counts.
    pub fn total_dkg_packet_sends(&self) -> usize {
        self.dkg_packet_sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerSender for InMemoryNetwork {
    async fn send_dkg_packet(&self, peer_address: &str, packet: DkgPacket) -> Result<()> {
        self.dkg_packet_sends.fetch_add(1, Ordering::SeqCst);
        match self.lookup(peer_address) {
            Some(inbox) => inbox.receive_dkg_packet(packet).await,
            None => Err(beacon_core::BeaconError::peer_failure(format!(
                "no such peer: {peer_address}"
            ))),
        }
    }
}

#[async_trait]
impl InfoPusher for InMemoryNetwork {
    async fn push_dkg_info(&self, peer_address: &str, packet: DkgInfoPacket) -> Result<()> {
        match self.lookup(peer_address) {
            Some(inbox) => inbox.receive_dkg_info(packet).await,
            None => Err(beacon_core::BeaconError::peer_failure(format!(
                "no such peer: {peer_address}"
            ))),
        }
    }
}
