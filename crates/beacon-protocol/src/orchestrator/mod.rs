//! DKG/reshare orchestrator (C6): the central state machine choreographing
//! C3/C4 (setup), C5 (phaser), and the pluggable engine into a single
//! session, with preemption of any prior in-flight session.

mod session;

pub use session::{SessionView, SessionViewData};

use beacon_core::{BeaconError, Clock, NodeIndex, Result, SessionId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::broadcast::{EchoBroadcaster, PeerSender};
use crate::dkg_engine::{DkgEngine, DkgEngineConfig, DkgOutcome, GroupSigner};
use crate::group::{validate_group_transition, GroupDescriptor, Identity};
use crate::phaser::Phaser;
use crate::push::{push_dkg_info, InfoPusher};
use crate::setup::{DeclaredParams, ReceiverHandle, SetupManager, SetupParams, SetupReceiver};
use crate::storage::{KeyStore, ShareStore, SharePersistence};

/// Snapshot of node-wide mutable state, guarded by one exclusive-write
/// lock. Long-running work (engine run, push fan-out) must not hold this
/// lock while blocking; callers lock, capture a clone, unlock, then work
/// against the captured value.
struct NodeState {
    group: Option<GroupDescriptor>,
    index: Option<NodeIndex>,
    session: Option<SessionHandle>,
    /// The leader's currently-collecting setup manager, if any. A
    /// `signal_dkg_participant` RPC handler reaches it through
    /// `Orchestrator::register_participant` rather than the leader's
    /// `run_fresh_dkg_leader`/`run_reshare_leader` task holding the only
    /// reference to it.
    setup_manager: Option<Arc<SetupManager>>,
    /// The broadcaster for whichever DKG/reshare session is currently
    /// running, if any. A `broadcast_dkg` RPC handler reaches it through
    /// `Orchestrator::deliver_dkg_packet` the same way.
    active_broadcaster: Option<Arc<EchoBroadcaster>>,
}

struct SessionHandle {
    id: SessionId,
    cancel: CancellationToken,
}

/// Parameters shared by fresh-DKG and resharing entry points.
pub struct SessionConfig {
    pub self_identity: Identity,
    pub is_leader: bool,
    pub expected_count: u32,
    pub threshold: u32,
    pub per_phase_timeout: Duration,
    /// The beacon's round cadence for a freshly-assembled group (§3);
    /// ignored by a reshare, which copies both from the outgoing group.
    pub period_secs: u64,
    pub catchup_period_secs: u64,
    pub shared_secret: Vec<u8>,
    pub start_in: Duration,
    pub scheme: crate::group::SchemeId,
    pub force: bool,
}

/// The orchestrator owns one node's DKG/reshare lifecycle. One instance
/// per node; `Arc`-shared with the control-plane RPC handlers.
pub struct Orchestrator {
    engine: Arc<dyn DkgEngine>,
    key_store: Arc<dyn KeyStore>,
    share_store: Arc<dyn ShareStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<NodeState>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn DkgEngine>,
        key_store: Arc<dyn KeyStore>,
        share_store: Arc<dyn ShareStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            key_store,
            share_store,
            clock,
            state: Mutex::new(NodeState {
                group: None,
                index: None,
                session: None,
                setup_manager: None,
                active_broadcaster: None,
            }),
        }
    }

    /// Preempts any in-flight session and installs a fresh one, returning
    /// its handle plus the token the caller must cancel on normal
    /// completion or early abort.
    fn begin_session(&self, allow_reentry_without_force: bool, force: bool) -> Result<(SessionId, CancellationToken)> {
        let mut state = self.state.lock();
        if let Some(existing) = state.session.take() {
            if !allow_reentry_without_force && !force {
                return Err(BeaconError::conflict(
                    "a DKG/reshare session is already in progress; pass force to override",
                ));
            }
            existing.cancel.cancel();
        }
        let id = SessionId::new();
        let cancel = CancellationToken::new();
        state.session = Some(SessionHandle { id, cancel: cancel.clone() });
        Ok((id, cancel))
    }

    fn end_session(&self, id: SessionId) {
        let mut state = self.state.lock();
        if matches!(&state.session, Some(handle) if handle.id == id) {
            state.session = None;
            state.setup_manager = None;
        }
    }

    /// Routes a follower's `signal_dkg_participant` registration into the
    /// setup manager this node is currently leading, if any.
    pub fn register_participant(
        &self,
        identity: Identity,
        secret_proof: &[u8],
        declared: DeclaredParams,
    ) -> Result<()> {
        let manager = {
            let state = self.state.lock();
            state.setup_manager.clone()
        }
        .ok_or_else(|| {
            BeaconError::not_ready("this node is not currently leading a DKG/reshare setup")
        })?;
        manager.on_prepare(identity, secret_proof, declared)?;
        Ok(())
    }

    /// Routes an incoming `broadcast_dkg` RPC into the broadcaster for
    /// whichever session is currently active on this node.
    pub async fn deliver_dkg_packet(&self, packet: crate::packets::DkgPacket) -> Result<()> {
        let broadcaster = {
            let state = self.state.lock();
            state.active_broadcaster.clone()
        };
        match broadcaster {
            Some(broadcaster) => broadcaster.receive(packet).await,
            None => Err(BeaconError::not_ready(
                "no DKG/reshare session is currently active on this node",
            )),
        }
    }

    /// Fresh DKG, leader branch: run C3, push the assembled group to every
    /// follower (C7), then run C5/engine as leader.
    #[instrument(skip(self, config, peer_sender, info_pusher))]
    pub async fn run_fresh_dkg_leader(
        &self,
        config: SessionConfig,
        peer_sender: Arc<dyn PeerSender>,
        info_pusher: Arc<dyn InfoPusher>,
    ) -> Result<GroupDescriptor> {
        {
            let state = self.state.lock();
            if state.group.is_some() {
                return Err(BeaconError::conflict("DKG already completed for this node"));
            }
        }
        // Leader-initiated setup always preempts; `force` is irrelevant here.
        let (session_id, cancel) = self.begin_session(true, true)?;

        let manager = Arc::new(SetupManager::new(
            SetupParams {
                expected_count: config.expected_count,
                threshold: config.threshold,
                dkg_timeout_secs: config.per_phase_timeout.as_secs(),
                period_secs: config.period_secs,
                catchup_period_secs: config.catchup_period_secs,
                leader_identity: config.self_identity.clone(),
                shared_secret: config.shared_secret.clone(),
                start_in_secs: config.start_in.as_secs(),
                scheme: config.scheme,
                previous_group: None,
            },
            self.clock.clone(),
        ));
        self.state.lock().setup_manager = Some(manager.clone());

        let group = tokio::select! {
            result = manager.wait_group() => result?,
            _ = cancel.cancelled() => {
                manager.stop_preemptively();
                self.end_session(session_id);
                return Err(BeaconError::preempted("session preempted while collecting keys"));
            }
        };

        let long_term = match self.key_store.load().await {
            Ok(key_pair) => key_pair,
            Err(err) => {
                self.end_session(session_id);
                return Err(err);
            }
        };
        if let Err(err) = push_dkg_info(
            &config.self_identity.address,
            &long_term,
            &GroupDescriptor::empty(),
            &group,
            config.per_phase_timeout.as_secs().max(1),
            config.shared_secret.clone(),
            info_pusher,
        )
        .await
        {
            self.end_session(session_id);
            return Err(err);
        }

        let result = self
            .run_engine_and_finish(&group, NodeIndex(1), None, None, true, config.per_phase_timeout, peer_sender, cancel.clone())
            .await;
        self.end_session(session_id);
        result
    }

    /// Fresh DKG, follower branch: run C4, then run C5/engine as
    /// non-leader.
    #[instrument(skip(self, config, peer_sender, info_receiver))]
    pub async fn run_fresh_dkg_follower(
        &self,
        config: SessionConfig,
        leader_public_key: beacon_crypto::PublicKey,
        info_receiver: tokio::sync::oneshot::Receiver<crate::packets::DkgInfoPacket>,
        peer_sender: Arc<dyn PeerSender>,
    ) -> Result<GroupDescriptor> {
        {
            let state = self.state.lock();
            if state.group.is_some() {
                return Err(BeaconError::conflict("DKG already completed for this node"));
            }
        }
        let (session_id, cancel) = self.begin_session(false, config.force)?;

        let receiver = SetupReceiver::new(
            config.shared_secret.clone(),
            config.self_identity.address.clone(),
            leader_public_key,
            false,
        );
        let group = tokio::select! {
            result = receiver.wait_info(info_receiver, Duration::from_secs(60)) => result?,
            _ = cancel.cancelled() => {
                receiver.stop();
                self.end_session(session_id);
                return Err(BeaconError::preempted("session preempted while awaiting DKG info"));
            }
        };

        let self_index = group
            .index_of(&config.self_identity.address)
            .ok_or_else(|| BeaconError::invalid("leader's group does not contain this node"))?;

        let result = self
            .run_engine_and_finish(&group, self_index, None, None, false, config.per_phase_timeout, peer_sender, cancel.clone())
            .await;
        self.end_session(session_id);
        result
    }

    /// Resharing: same shape, but `old_group`/`old_threshold` configure
    /// the engine for the transition and the node may be entering,
    /// staying, or leaving.
    #[instrument(skip(self, config, peer_sender, info_pusher))]
    pub async fn run_reshare_leader(
        &self,
        config: SessionConfig,
        old_group: GroupDescriptor,
        old_threshold: u32,
        peer_sender: Arc<dyn PeerSender>,
        info_pusher: Arc<dyn InfoPusher>,
    ) -> Result<GroupDescriptor> {
        let (session_id, cancel) = self.begin_session(true, true)?;

        let manager = Arc::new(SetupManager::new(
            SetupParams {
                expected_count: config.expected_count,
                threshold: config.threshold,
                dkg_timeout_secs: config.per_phase_timeout.as_secs(),
                period_secs: config.period_secs,
                catchup_period_secs: config.catchup_period_secs,
                leader_identity: config.self_identity.clone(),
                shared_secret: config.shared_secret.clone(),
                start_in_secs: config.start_in.as_secs(),
                scheme: config.scheme,
                previous_group: Some(old_group.clone()),
            },
            self.clock.clone(),
        ));
        self.state.lock().setup_manager = Some(manager.clone());

        let new_group = tokio::select! {
            result = manager.wait_group() => result?,
            _ = cancel.cancelled() => {
                manager.stop_preemptively();
                self.end_session(session_id);
                return Err(BeaconError::preempted("session preempted while collecting keys"));
            }
        };

        if let Err(err) = validate_group_transition(&old_group, &new_group, self.clock.now_ms()) {
            self.end_session(session_id);
            return Err(err);
        }

        let long_term = match self.key_store.load().await {
            Ok(key_pair) => key_pair,
            Err(err) => {
                self.end_session(session_id);
                return Err(err);
            }
        };
        if let Err(err) = push_dkg_info(
            &config.self_identity.address,
            &long_term,
            &old_group,
            &new_group,
            config.per_phase_timeout.as_secs().max(1),
            config.shared_secret.clone(),
            info_pusher,
        )
        .await
        {
            self.end_session(session_id);
            return Err(err);
        }

        let self_index = new_group.index_of(&config.self_identity.address).unwrap_or(NodeIndex(1));
        let result = self
            .run_engine_and_finish(
                &new_group,
                self_index,
                Some(old_group),
                Some(old_threshold),
                true,
                config.per_phase_timeout,
                peer_sender,
                cancel.clone(),
            )
            .await;
        self.end_session(session_id);
        result
    }

    #[instrument(skip(self, config, peer_sender, info_receiver))]
    pub async fn run_reshare_follower(
        &self,
        config: SessionConfig,
        old_group: GroupDescriptor,
        old_threshold: u32,
        leader_public_key: beacon_crypto::PublicKey,
        info_receiver: tokio::sync::oneshot::Receiver<crate::packets::DkgInfoPacket>,
        peer_sender: Arc<dyn PeerSender>,
    ) -> Result<GroupDescriptor> {
        let (session_id, cancel) = self.begin_session(false, config.force)?;

        let self_in_old_group = old_group.index_of(&config.self_identity.address).is_some();
        let receiver = SetupReceiver::new(
            config.shared_secret.clone(),
            config.self_identity.address.clone(),
            leader_public_key,
            self_in_old_group,
        );
        let new_group = tokio::select! {
            result = receiver.wait_info(info_receiver, Duration::from_secs(60)) => result?,
            _ = cancel.cancelled() => {
                receiver.stop();
                self.end_session(session_id);
                return Err(BeaconError::preempted("session preempted while awaiting DKG info"));
            }
        };

        validate_group_transition(&old_group, &new_group, self.clock.now_ms())?;

        // A node leaving the group (present in old, absent from new) keeps
        // its old index for the engine's bookkeeping rather than being
        // renumbered; it exits once the transition completes.
        let self_index = new_group
            .index_of(&config.self_identity.address)
            .or_else(|| old_group.index_of(&config.self_identity.address))
            .ok_or_else(|| BeaconError::invalid("node is in neither the old nor new group"))?;

        let result = self
            .run_engine_and_finish(
                &new_group,
                self_index,
                Some(old_group),
                Some(old_threshold),
                false,
                config.per_phase_timeout,
                peer_sender,
                cancel.clone(),
            )
            .await;
        self.end_session(session_id);
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_engine_and_finish(
        &self,
        group: &GroupDescriptor,
        self_index: NodeIndex,
        old_group: Option<GroupDescriptor>,
        old_threshold: Option<u32>,
        is_leader: bool,
        per_phase_timeout: Duration,
        peer_sender: Arc<dyn PeerSender>,
        cancel: CancellationToken,
    ) -> Result<GroupDescriptor> {
        {
            let mut state = self.state.lock();
            state.index = Some(self_index);
        }

        let long_term = self.key_store.load().await?;
        let signer = Arc::new(GroupSigner::new(long_term, group.clone()));
        let broadcaster = Arc::new(EchoBroadcaster::new(self_index, group.clone(), signer, peer_sender));
        let deals = broadcaster.take_deal_receiver().expect("fresh broadcaster");
        let responses = broadcaster.take_response_receiver().expect("fresh broadcaster");
        let justifications = broadcaster.take_justification_receiver().expect("fresh broadcaster");

        let board: Arc<dyn crate::dkg_engine::Board> = broadcaster.clone();
        let engine_config = DkgEngineConfig {
            new_group: group.clone(),
            old_group,
            old_threshold,
            is_leader,
            fast_sync: true,
        };
        let protocol = self.engine.new_protocol(engine_config, board)?;

        self.state.lock().active_broadcaster = Some(broadcaster.clone());
        let phaser = Phaser::new(per_phase_timeout, cancel);
        let outcome = phaser.run(protocol, deals, responses, justifications).await;
        broadcaster.stop();
        self.state.lock().active_broadcaster = None;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "DKG session aborted; in-memory state cleared");
                let mut state = self.state.lock();
                state.index = None;
                return Err(err);
            }
        };

        self.finish(group.clone(), outcome).await
    }

    async fn finish(&self, mut group: GroupDescriptor, outcome: DkgOutcome) -> Result<GroupDescriptor> {
        group.public_key = outcome.public_key;
        self.share_store
            .put(SharePersistence { share: outcome.share, group: group.clone() })
            .await?;

        let mut state = self.state.lock();
        state.group = Some(group.clone());
        info!(hash = %group.hash()?, "DKG/reshare session complete");
        Ok(group)
    }

    pub fn current_group(&self) -> Option<GroupDescriptor> {
        self.state.lock().group.clone()
    }

    pub fn current_index(&self) -> Option<NodeIndex> {
        self.state.lock().index
    }
}

/// Translates a follower's declared parameters, as carried on a
/// `signal_dkg_participant` RPC, into the shape `register_participant`
/// passes through to `SetupManager::on_prepare`.
pub fn declared_params(expected_count: u32, threshold: u32, dkg_timeout_secs: u64) -> DeclaredParams {
    DeclaredParams { expected_count, threshold, dkg_timeout_secs }
}

/// Re-exported so callers constructing a `ReceiverHandle` manually (e.g.
/// in `beacon-testkit`) don't need to import `crate::setup` directly.
pub type SetupReceiverHandle = ReceiverHandle;
