//! Status/observability endpoints (C8): a point-in-time snapshot of DKG,
//! reshare, beacon, and chain-store state, plus a bounded-timeout
//! reachability probe over a peer list.

use async_trait::async_trait;
use beacon_core::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DkgState {
    NotStarted,
    InProgress,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReshareState {
    NotInProgress,
    InProgress,
}

/// Mirrors the external beacon loop's own state machine; this crate only
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconState {
    pub inited: bool,
    pub is_started: bool,
    pub is_stopped: bool,
    pub is_running: bool,
    pub is_serving: bool,
}

impl BeaconState {
    pub fn not_inited() -> Self {
        Self { inited: false, is_started: false, is_stopped: false, is_running: false, is_serving: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStoreState {
    pub is_empty: bool,
    pub last_round: u64,
    pub length: u64,
}

impl ChainStoreState {
    pub fn empty() -> Self {
        Self { is_empty: true, last_round: 0, length: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub dkg_state: DkgState,
    pub reshare_state: ReshareState,
    pub beacon_state: BeaconState,
    pub chain_store: ChainStoreState,
}

/// Provides the node-local facts a status snapshot is built from; the
/// beacon loop and chain store are external collaborators, so this is
/// the seam between them and C8.
pub trait StatusSource: Send + Sync {
    fn dkg_state(&self) -> DkgState;
    fn reshare_state(&self) -> ReshareState;
    fn beacon_state(&self) -> BeaconState;
    fn chain_store_state(&self) -> ChainStoreState;
}

pub fn snapshot(source: &dyn StatusSource) -> StatusSnapshot {
    StatusSnapshot {
        dkg_state: source.dkg_state(),
        reshare_state: source.reshare_state(),
        beacon_state: source.beacon_state(),
        chain_store: source.chain_store_state(),
    }
}

/// A single reachability probe, implemented by the RPC substrate.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn ping(&self, address: &str) -> Result<()>;
}

/// Probes a caller-supplied peer list (or, if empty, `fallback_group`)
/// with a bounded timeout and returns a reachability map.
pub async fn probe_reachability(
    probe: Arc<dyn ReachabilityProbe>,
    peers: Vec<String>,
    fallback_group: &[String],
    timeout: Duration,
) -> BTreeMap<String, bool> {
    let targets: Vec<String> = if peers.is_empty() {
        fallback_group.to_vec()
    } else {
        peers
    };

    let mut workers = JoinSet::new();
    for address in targets {
        let probe = probe.clone();
        workers.spawn(async move {
            let reachable = tokio::time::timeout(timeout, probe.ping(&address))
                .await
                .map(|result| result.is_ok())
                .unwrap_or(false);
            (address, reachable)
        });
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = workers.join_next().await {
        if let Ok((address, reachable)) = joined {
            results.insert(address, reachable);
        }
    }
    results
}

/// Aggregates the same probe across multiple remote peers' own status
/// views (`RemoteStatus`): each entry maps the probed peer to whether it,
/// in turn, reported its own group as reachable.
pub async fn remote_status(
    probe: Arc<dyn ReachabilityProbe>,
    peers: Vec<String>,
    timeout: Duration,
) -> BTreeMap<String, bool> {
    probe_reachability(probe, peers, &[], timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource;

    impl StatusSource for FakeSource {
        fn dkg_state(&self) -> DkgState {
            DkgState::Ready
        }
        fn reshare_state(&self) -> ReshareState {
            ReshareState::NotInProgress
        }
        fn beacon_state(&self) -> BeaconState {
            BeaconState { inited: true, is_started: true, is_stopped: false, is_running: true, is_serving: true }
        }
        fn chain_store_state(&self) -> ChainStoreState {
            ChainStoreState { is_empty: false, last_round: 42, length: 43 }
        }
    }

    #[test]
    fn snapshot_reflects_the_source() {
        let snap = snapshot(&FakeSource);
        assert_eq!(snap.dkg_state, DkgState::Ready);
        assert_eq!(snap.chain_store.last_round, 42);
    }

    struct SelectivelyReachable {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReachabilityProbe for SelectivelyReachable {
        async fn ping(&self, address: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if address == "up:1" {
                Ok(())
            } else {
                Err(beacon_core::BeaconError::peer_failure("down"))
            }
        }
    }

    #[tokio::test]
    async fn probe_reports_reachability_per_peer() {
        let probe = Arc::new(SelectivelyReachable { calls: AtomicUsize::new(0) });
        let result = probe_reachability(
            probe,
            vec!["up:1".to_string(), "down:1".to_string()],
            &[],
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(result.get("up:1"), Some(&true));
        assert_eq!(result.get("down:1"), Some(&false));
    }

    #[tokio::test]
    async fn empty_peer_list_falls_back_to_the_current_group() {
        let probe = Arc::new(SelectivelyReachable { calls: AtomicUsize::new(0) });
        let fallback = vec!["up:1".to_string()];
        let result = probe_reachability(probe, vec![], &fallback, Duration::from_secs(1)).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("up:1"), Some(&true));
    }
}
