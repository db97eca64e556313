//! C2: reliable best-effort echo broadcast with at-most-once local delivery.
//!
//! Every bundle is delivered to the local DKG engine exactly once and
//! fanned out to every other node; a slow or failing peer never blocks
//! local delivery, and signature failures drop the packet without
//! poisoning the arrival-set so a later valid copy can still land.

use async_trait::async_trait;
use beacon_core::{BeaconError, NodeIndex, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::arrival::ArrivalSet;
use crate::dkg_engine::PacketSigner;
use crate::group::GroupDescriptor;
use crate::packets::{BundleKind, DkgPacket};

/// The RPC substrate's contract for sending one DKG packet to one peer.
/// Send failures are expected and non-fatal — echo amplification from
/// other peers is relied on to close the gap.
#[async_trait]
pub trait PeerSender: Send + Sync {
    async fn send_dkg_packet(&self, peer_address: &str, packet: DkgPacket) -> Result<()>;
}

/// Maximum number of concurrent outbound sends; backpressure policy keeps
/// a slow peer from starving the others' delivery.
const FANOUT_WORKERS: usize = 8;

/// Bounded delivery channel for one bundle kind, one slot per possible
/// originator.
struct DeliveryChannel {
    tx: mpsc::Sender<(NodeIndex, Vec<u8>)>,
    rx: Mutex<Option<mpsc::Receiver<(NodeIndex, Vec<u8>)>>>,
}

impl DeliveryChannel {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Deliver to the local engine. A full channel is a logical invariant
    /// violation (the engine is malfunctioning); the session is aborted.
    async fn deliver(&self, from: NodeIndex, payload: Vec<u8>) -> Result<()> {
        self.tx
            .try_send((from, payload))
            .map_err(|_| BeaconError::fatal("local delivery channel full: engine malfunction"))
    }

    /// Taken once by the phaser/DKG adapter (C5); a second take returns
    /// `None`, which the caller treats as a programming error.
    fn take_receiver(&self) -> Option<mpsc::Receiver<(NodeIndex, Vec<u8>)>> {
        self.rx.lock().take()
    }
}

/// The echo broadcaster: one instance per active DKG/reshare session.
pub struct EchoBroadcaster {
    self_index: NodeIndex,
    group: GroupDescriptor,
    arrival: Arc<ArrivalSet>,
    signer: Arc<dyn PacketSigner>,
    sender: Arc<dyn PeerSender>,
    deals: DeliveryChannel,
    responses: DeliveryChannel,
    justifications: DeliveryChannel,
    fanout_permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl EchoBroadcaster {
    pub fn new(
        self_index: NodeIndex,
        group: GroupDescriptor,
        signer: Arc<dyn PacketSigner>,
        sender: Arc<dyn PeerSender>,
    ) -> Self {
        let capacity = group.len().max(1);
        Self {
            self_index,
            group,
            arrival: Arc::new(ArrivalSet::new()),
            signer,
            sender,
            deals: DeliveryChannel::new(capacity),
            responses: DeliveryChannel::new(capacity),
            justifications: DeliveryChannel::new(capacity),
            fanout_permits: Arc::new(Semaphore::new(FANOUT_WORKERS)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn take_deal_receiver(&self) -> Option<mpsc::Receiver<(NodeIndex, Vec<u8>)>> {
        self.deals.take_receiver()
    }

    pub fn take_response_receiver(&self) -> Option<mpsc::Receiver<(NodeIndex, Vec<u8>)>> {
        self.responses.take_receiver()
    }

    pub fn take_justification_receiver(&self) -> Option<mpsc::Receiver<(NodeIndex, Vec<u8>)>> {
        self.justifications.take_receiver()
    }

    fn channel_for(&self, kind: BundleKind) -> &DeliveryChannel {
        match kind {
            BundleKind::Deal => &self.deals,
            BundleKind::Response => &self.responses,
            BundleKind::Justification => &self.justifications,
        }
    }

    /// Originate a bundle: sign it, record it, deliver it locally, and fan
    /// it out to every other node in the current group. Re-originating a
    /// bundle whose hash is already in the arrival-set is a no-op, the same
    /// at-most-once guarantee `receive` gives a relayed copy.
    #[instrument(skip(self, payload), fields(self_index = %self.self_index.0))]
    pub async fn push(&self, kind: BundleKind, payload: Vec<u8>) -> Result<()> {
        let signature = self.signer.sign(&payload);
        let packet = DkgPacket {
            kind,
            dealer_index: self.self_index,
            payload,
            signature,
        };
        let hash = packet.content_hash()?;
        if self.arrival.exists(hash) {
            return Ok(());
        }
        self.arrival.put(hash);
        self.channel_for(kind)
            .deliver(self.self_index, packet.payload.clone())
            .await?;
        self.fan_out(&packet, hash).await;
        Ok(())
    }

    /// Server-side reception of a packet relayed by a peer.
    #[instrument(skip(self, packet), fields(self_index = %self.self_index.0, dealer = %packet.dealer_index.0))]
    pub async fn receive(&self, packet: DkgPacket) -> Result<()> {
        let hash = packet.content_hash()?;
        if self.arrival.exists(hash) {
            return Ok(());
        }

        if let Err(err) =
            self.signer
                .verify(packet.dealer_index, &packet.payload, &packet.signature)
        {
            warn!(error = %err, "dropping DKG packet with invalid signature");
            return Ok(());
        }

        self.arrival.put(hash);
        self.channel_for(packet.kind)
            .deliver(packet.dealer_index, packet.payload.clone())
            .await?;
        self.fan_out(&packet, hash).await;
        Ok(())
    }

    async fn fan_out(&self, packet: &DkgPacket, _hash: beacon_core::Hash32) {
        let peers: Vec<String> = self
            .group
            .nodes
            .iter()
            .filter(|n| n.index != self.self_index)
            .map(|n| n.identity.address.clone())
            .collect();

        let mut workers = JoinSet::new();
        for peer in peers {
            let permits = self.fanout_permits.clone();
            let sender = self.sender.clone();
            let packet = packet.clone();
            let cancel = self.cancel.clone();
            workers.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                tokio::select! {
                    result = sender.send_dkg_packet(&peer, packet) => {
                        if let Err(err) = result {
                            warn!(peer, error = %err, "peer send failed, relying on echo amplification");
                        }
                    }
                    _ = cancel.cancelled() => {}
                }
            });
        }
        while workers.join_next().await.is_some() {}
    }

    /// Cancel all pending sends and close delivery channels.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
