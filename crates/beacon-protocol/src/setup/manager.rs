//! Leader-side setup manager (C3): collects participant identities over RPC
//! until the expected count is present, then assembles and dispatches the
//! group descriptor.

use beacon_core::{BeaconError, Clock, Result};
use bls12_381_plus::group::GroupEncoding;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::group::{DistKeyPublic, GroupDescriptor, Identity, Node, SchemeId};
use beacon_core::{Hash32, NodeIndex};

/// Fixed at construction; a leader runs one `SetupManager` per active
/// session.
pub struct SetupParams {
    pub expected_count: u32,
    pub threshold: u32,
    pub dkg_timeout_secs: u64,
    /// The beacon's own round cadence (§3), independent of
    /// `dkg_timeout_secs`; only used for a fresh group, since a reshare
    /// copies `period_secs`/`catchup_period_secs` from `previous_group`.
    pub period_secs: u64,
    pub catchup_period_secs: u64,
    pub leader_identity: Identity,
    pub shared_secret: Vec<u8>,
    pub start_in_secs: u64,
    pub scheme: SchemeId,
    /// Present for resharing: genesis time, seed, and period are copied
    /// from here instead of freshly derived.
    pub previous_group: Option<GroupDescriptor>,
}

/// Declared by the caller of `on_prepare`; must match the leader's own
/// parameters or the registration is rejected outright.
pub struct DeclaredParams {
    pub expected_count: u32,
    pub threshold: u32,
    pub dkg_timeout_secs: u64,
}

/// Handed back to a follower's registration call: a one-shot channel that
/// will carry the assembled group (or close on rejection/preemption), and
/// a one-shot the follower uses to acknowledge receipt.
pub struct ReceiverHandle {
    pub group_rx: oneshot::Receiver<GroupDescriptor>,
    pub done_tx: oneshot::Sender<()>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    CollectingKeys,
    GroupReady,
    Done,
}

struct Waiter {
    group_tx: oneshot::Sender<GroupDescriptor>,
    done_rx: oneshot::Receiver<()>,
    address: String,
}

struct Inner {
    phase: Phase,
    identities: Vec<Identity>,
    waiters: Vec<Waiter>,
}

pub struct SetupManager {
    params: SetupParams,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    ready: tokio::sync::Notify,
}

fn same_public_key(a: &Identity, b: &Identity) -> bool {
    a.public_key.0.to_bytes().as_ref() == b.public_key.0.to_bytes().as_ref()
}

impl SetupManager {
    pub fn new(params: SetupParams, clock: Arc<dyn Clock>) -> Self {
        Self {
            params,
            clock,
            inner: Mutex::new(Inner {
                phase: Phase::CollectingKeys,
                identities: Vec::new(),
                waiters: Vec::new(),
            }),
            ready: tokio::sync::Notify::new(),
        }
    }

    /// Validate and enqueue a follower's identity. Duplicate registrations
    /// get a handle whose group channel is already closed (soft
    /// rejection); malformed or mismatched registrations are hard errors.
    pub fn on_prepare(
        &self,
        identity: Identity,
        secret_proof: &[u8],
        declared: DeclaredParams,
    ) -> Result<ReceiverHandle> {
        if secret_proof != self.params.shared_secret.as_slice() {
            return Err(BeaconError::invalid("secret proof mismatch"));
        }
        if identity.address.is_empty() {
            return Err(BeaconError::invalid("identity missing address"));
        }
        if declared.expected_count != self.params.expected_count
            || declared.threshold != self.params.threshold
            || declared.dkg_timeout_secs != self.params.dkg_timeout_secs
        {
            return Err(BeaconError::invalid(
                "declared setup parameters do not match the leader",
            ));
        }

        let (group_tx, group_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let mut inner = self.inner.lock();
        if inner.phase != Phase::CollectingKeys {
            return Err(BeaconError::conflict(
                "setup is no longer accepting participants",
            ));
        }

        let duplicate = inner
            .identities
            .iter()
            .any(|existing| existing.address == identity.address || same_public_key(existing, &identity));
        if duplicate {
            drop(group_tx);
            return Ok(ReceiverHandle { group_rx, done_tx });
        }

        inner.identities.push(identity.clone());
        inner.waiters.push(Waiter {
            group_tx,
            done_rx,
            address: identity.address.clone(),
        });

        // +1 for the leader, counted implicitly.
        let ready = inner.identities.len() as u32 + 1 >= self.params.expected_count;
        if ready {
            inner.phase = Phase::GroupReady;
        }
        drop(inner);
        if ready {
            self.ready.notify_one();
        }

        Ok(ReceiverHandle { group_rx, done_tx })
    }

    /// Resolves once N-1 followers have registered; assembles the group,
    /// dispatches it to every waiter, and collects their acknowledgements
    /// before returning.
    pub async fn wait_group(&self) -> Result<GroupDescriptor> {
        loop {
            {
                let inner = self.inner.lock();
                match inner.phase {
                    Phase::Done => {
                        return Err(BeaconError::preempted(
                            "setup manager was stopped before the group was ready",
                        ))
                    }
                    Phase::GroupReady => break,
                    Phase::CollectingKeys => {}
                }
            }
            self.ready.notified().await;
        }
        self.assemble_and_dispatch().await
    }

    /// Moves the manager to `Done` without emitting a group; existing
    /// waiters observe their group channel close.
    pub fn stop_preemptively(&self) {
        let mut inner = self.inner.lock();
        if inner.phase == Phase::Done {
            return;
        }
        inner.phase = Phase::Done;
        inner.waiters.clear();
        drop(inner);
        self.ready.notify_one();
    }

    fn assemble(&self, identities: &[Identity]) -> GroupDescriptor {
        let mut nodes = Vec::with_capacity(identities.len() + 1);
        nodes.push(Node {
            index: NodeIndex(1),
            identity: self.params.leader_identity.clone(),
        });
        for (offset, identity) in identities.iter().enumerate() {
            nodes.push(Node {
                index: NodeIndex(offset as u32 + 2),
                identity: identity.clone(),
            });
        }

        let now_ms = self.clock.now_ms();
        match &self.params.previous_group {
            Some(old) => GroupDescriptor {
                nodes,
                threshold: self.params.threshold,
                period_secs: old.period_secs,
                catchup_period_secs: old.catchup_period_secs,
                genesis_time_ms: old.genesis_time_ms,
                transition_time_ms: Some(now_ms + self.params.start_in_secs * 1000),
                genesis_seed: old.genesis_seed,
                scheme: self.params.scheme,
                public_key: DistKeyPublic { coefficients: vec![] },
            },
            None => {
                let mut seed_input: Vec<u8> = self.params.leader_identity.address.clone().into_bytes();
                for identity in identities {
                    seed_input.extend_from_slice(identity.address.as_bytes());
                }
                GroupDescriptor {
                    nodes,
                    threshold: self.params.threshold,
                    period_secs: self.params.period_secs.max(1),
                    catchup_period_secs: self.params.catchup_period_secs.max(1),
                    genesis_time_ms: now_ms + self.params.start_in_secs * 1000,
                    transition_time_ms: None,
                    genesis_seed: Hash32::of(&seed_input),
                    scheme: self.params.scheme,
                    public_key: DistKeyPublic { coefficients: vec![] },
                }
            }
        }
    }

    async fn assemble_and_dispatch(&self) -> Result<GroupDescriptor> {
        let (identities, waiters) = {
            let mut inner = self.inner.lock();
            let identities = inner.identities.clone();
            let waiters = std::mem::take(&mut inner.waiters);
            (identities, waiters)
        };

        let group = self.assemble(&identities);
        info!(nodes = group.len(), "setup manager assembled group");

        let grace = Duration::from_secs(self.params.dkg_timeout_secs.max(1));
        for waiter in waiters {
            let address = waiter.address;
            if waiter.group_tx.send(group.clone()).is_err() {
                warn!(address, "waiter dropped before group could be delivered");
                continue;
            }
            match tokio::time::timeout(grace, waiter.done_rx).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!(address, "waiter dropped before acknowledging group"),
                Err(_) => warn!(address, "waiter did not acknowledge group within grace period"),
            }
        }

        let mut inner = self.inner.lock();
        inner.phase = Phase::Done;
        Ok(group)
    }
}
