//! Phaser & DKG adapter (C5): a monotonic timer driving phase transitions
//! `Init -> Deals -> Responses -> Justifications -> Finished`, wired to
//! the broadcaster's delivery channels and the pluggable engine.

use beacon_core::{NodeIndex, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::broadcast::EchoBroadcaster;
use crate::dkg_engine::{Board, DkgOutcome, DkgProtocol};
use crate::packets::BundleKind;

/// Phase names, in the order the phaser drives the engine through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Deals,
    Responses,
    Justifications,
    Finished,
}

/// Drives one `DkgProtocol` instance to completion: pumps the
/// broadcaster's three delivery channels into the engine, and advances
/// through phases either on the per-phase timeout or as soon as
/// `phase_ready()` reports fast-sync completion.
pub struct Phaser {
    per_phase_timeout: Duration,
    cancel: CancellationToken,
}

impl Phaser {
    pub fn new(per_phase_timeout: Duration, cancel: CancellationToken) -> Self {
        Self { per_phase_timeout, cancel }
    }

    /// Runs every phase to completion (or cancellation) and returns the
    /// engine's outcome. `board` is handed to the caller so outgoing
    /// bundles signed by the engine can be pushed through C2; the deal,
    /// response, and justification receivers are the board's own
    /// delivery channels.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        mut protocol: Box<dyn DkgProtocol>,
        mut deals: mpsc::Receiver<(NodeIndex, Vec<u8>)>,
        mut responses: mpsc::Receiver<(NodeIndex, Vec<u8>)>,
        mut justifications: mpsc::Receiver<(NodeIndex, Vec<u8>)>,
    ) -> Result<DkgOutcome> {
        let mut phase = Phase::Init;
        loop {
            match phase {
                Phase::Init => {
                    phase = Phase::Deals;
                    continue;
                }
                Phase::Deals => {
                    self.drive_phase(&mut protocol, &mut deals, BundleKind::Deal).await?;
                    phase = Phase::Responses;
                }
                Phase::Responses => {
                    self.drive_phase(&mut protocol, &mut responses, BundleKind::Response)
                        .await?;
                    phase = Phase::Justifications;
                }
                Phase::Justifications => {
                    self.drive_phase(&mut protocol, &mut justifications, BundleKind::Justification)
                        .await?;
                    phase = Phase::Finished;
                }
                Phase::Finished => {
                    return protocol.wait_end().await;
                }
            }
        }
    }

    async fn drive_phase(
        &self,
        protocol: &mut Box<dyn DkgProtocol>,
        incoming: &mut mpsc::Receiver<(NodeIndex, Vec<u8>)>,
        kind: BundleKind,
    ) -> Result<()> {
        let deadline = tokio::time::sleep(self.per_phase_timeout);
        tokio::pin!(deadline);

        loop {
            if protocol.phase_ready() {
                debug!(?kind, "phase ready ahead of timeout (fast sync)");
                return Ok(());
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return Err(beacon_core::BeaconError::preempted("phaser cancelled"));
                }
                maybe_packet = incoming.recv() => {
                    match maybe_packet {
                        Some((from, payload)) => {
                            match kind {
                                BundleKind::Deal => protocol.handle_deal(from, payload).await?,
                                BundleKind::Response => protocol.handle_response(from, payload).await?,
                                BundleKind::Justification => protocol.handle_justification(from, payload).await?,
                            }
                        }
                        None => {
                            // Broadcaster shut down; keep waiting for the timeout
                            // so a late fast-sync success is still observed.
                        }
                    }
                }
                _ = &mut deadline => {
                    debug!(?kind, "phase timed out, advancing");
                    return Ok(());
                }
            }
        }
    }
}

/// Signs and pushes the engine's outgoing bundles through the board
/// (C2), matching the adapter's half of the contract: the phaser pumps
/// inbound traffic into the engine, this pushes outbound traffic out.
pub struct OutgoingAdapter {
    board: Arc<dyn Board>,
}

impl OutgoingAdapter {
    pub fn new(board: Arc<dyn Board>) -> Self {
        Self { board }
    }

    pub async fn push_deal(&self, payload: Vec<u8>) -> Result<()> {
        self.board.push_deal(payload).await
    }

    pub async fn push_response(&self, payload: Vec<u8>) -> Result<()> {
        self.board.push_response(payload).await
    }

    pub async fn push_justification(&self, payload: Vec<u8>) -> Result<()> {
        self.board.push_justification(payload).await
    }
}

#[async_trait::async_trait]
impl Board for EchoBroadcaster {
    async fn push_deal(&self, payload: Vec<u8>) -> Result<()> {
        self.push(BundleKind::Deal, payload).await
    }

    async fn push_response(&self, payload: Vec<u8>) -> Result<()> {
        self.push(BundleKind::Response, payload).await
    }

    async fn push_justification(&self, payload: Vec<u8>) -> Result<()> {
        self.push(BundleKind::Justification, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dkg_engine::DkgOutcome as Outcome;
    use crate::group::DistKeyPublic;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ImmediatelyReadyProtocol {
        ready: AtomicBool,
        deals_seen: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl DkgProtocol for ImmediatelyReadyProtocol {
        async fn handle_deal(&mut self, _from: NodeIndex, _payload: Vec<u8>) -> Result<()> {
            self.deals_seen.fetch_add(1, Ordering::SeqCst);
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn handle_response(&mut self, _from: NodeIndex, _payload: Vec<u8>) -> Result<()> {
            Ok(())
        }
        async fn handle_justification(&mut self, _from: NodeIndex, _payload: Vec<u8>) -> Result<()> {
            Ok(())
        }
        fn phase_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
        async fn wait_end(&mut self) -> Result<Outcome> {
            Ok(Outcome {
                share: vec![1, 2, 3],
                public_key: DistKeyPublic { coefficients: vec![] },
            })
        }
    }

    #[tokio::test]
    async fn fast_sync_advances_without_waiting_for_timeout() {
        let phaser = Phaser::new(Duration::from_secs(30), CancellationToken::new());
        let protocol: Box<dyn DkgProtocol> = Box::new(ImmediatelyReadyProtocol {
            ready: AtomicBool::new(false),
            deals_seen: std::sync::atomic::AtomicUsize::new(0),
        });

        let (deal_tx, deal_rx) = mpsc::channel(4);
        let (_resp_tx, resp_rx) = mpsc::channel(4);
        let (_just_tx, just_rx) = mpsc::channel(4);

        deal_tx.send((NodeIndex(1), vec![9])).await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            phaser.run(protocol, deal_rx, resp_rx, just_rx),
        )
        .await
        .expect("should not hit the 30s per-phase timeout")
        .unwrap();

        assert_eq!(outcome.share, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn cancellation_during_a_phase_is_reported_as_preempted() {
        let cancel = CancellationToken::new();
        let phaser = Phaser::new(Duration::from_secs(30), cancel.clone());
        let protocol: Box<dyn DkgProtocol> = Box::new(ImmediatelyReadyProtocol {
            ready: AtomicBool::new(false),
            deals_seen: std::sync::atomic::AtomicUsize::new(0),
        });

        let (_deal_tx, deal_rx) = mpsc::channel(4);
        let (_resp_tx, resp_rx) = mpsc::channel(4);
        let (_just_tx, just_rx) = mpsc::channel(4);

        cancel.cancel();
        let result = phaser.run(protocol, deal_rx, resp_rx, just_rx).await;
        assert!(matches!(result, Err(beacon_core::BeaconError::Preempted { .. })));
    }
}
