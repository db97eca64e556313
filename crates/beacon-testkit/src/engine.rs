//! A trivial stand-in for the pluggable DKG engine (the real
//! verifiable-secret-sharing algebra is an external collaborator, out of
//! scope here). Each instance originates one deal of its own onto the
//! board as soon as it is constructed, and completes as soon as it has
//! seen one deal from every other participant, producing a fake share
//! (the XOR of every deal it collected) so orchestration-level tests
//! don't need real threshold cryptography.

use async_trait::async_trait;
use beacon_core::{NodeIndex, Result};
use beacon_protocol::{
    Board, DistKeyPublic, DkgEngine, DkgEngineConfig, DkgOutcome, DkgProtocol, OutgoingAdapter,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Gives every protocol instance in the process a distinct deal payload,
/// so two nodes never collide on one all-zero "fake share".
static NEXT_DEAL_ID: AtomicU64 = AtomicU64::new(1);

pub struct FakeDkgEngine;

impl DkgEngine for FakeDkgEngine {
    fn new_protocol(
        &self,
        config: DkgEngineConfig,
        board: Arc<dyn Board>,
    ) -> Result<Box<dyn DkgProtocol>> {
        let expected: usize = config.new_group.len().saturating_sub(1);
        let outgoing = OutgoingAdapter::new(board);
        let deal_id = NEXT_DEAL_ID.fetch_add(1, Ordering::Relaxed);
        let payload = deal_id.to_le_bytes().to_vec();
        tokio::spawn(async move {
            if let Err(err) = outgoing.push_deal(payload.clone()).await {
                warn!(error = %err, "fake engine failed to push its own deal");
            }
            if let Err(err) = outgoing.push_response(payload.clone()).await {
                warn!(error = %err, "fake engine failed to push its own response");
            }
            if let Err(err) = outgoing.push_justification(payload).await {
                warn!(error = %err, "fake engine failed to push its own justification");
            }
        });

        Ok(Box::new(FakeDkgProtocol {
            expected,
            deals: Mutex::new(BTreeMap::new()),
        }))
    }
}

struct FakeDkgProtocol {
    expected: usize,
    deals: Mutex<BTreeMap<NodeIndex, Vec<u8>>>,
}

#[async_trait]
impl DkgProtocol for FakeDkgProtocol {
    async fn handle_deal(&mut self, from: NodeIndex, payload: Vec<u8>) -> Result<()> {
        self.deals.lock().insert(from, payload);
        Ok(())
    }

    async fn handle_response(&mut self, _from: NodeIndex, _payload: Vec<u8>) -> Result<()> {
        Ok(())
    }

    async fn handle_justification(&mut self, _from: NodeIndex, _payload: Vec<u8>) -> Result<()> {
        Ok(())
    }

    fn phase_ready(&self) -> bool {
        self.deals.lock().len() >= self.expected
    }

    async fn wait_end(&mut self) -> Result<DkgOutcome> {
        let deals = self.deals.lock();
        let mut share = vec![0u8; 32];
        for payload in deals.values() {
            for (i, byte) in payload.iter().take(32).enumerate() {
                share[i] ^= byte;
            }
        }
        Ok(DkgOutcome { share, public_key: DistKeyPublic { coefficients: vec![] } })
    }
}
