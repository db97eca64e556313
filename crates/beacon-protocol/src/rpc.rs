//! External RPC surface contracts (§6): the shapes the real wire
//! transport (protobuf/tonic, out of scope here) must implement. Control
//! is node-local/operator-facing; Protocol is node-to-node.

use async_trait::async_trait;
use beacon_core::Result;
use futures::stream::BoxStream;

use crate::group::GroupDescriptor;
use crate::packets::{DkgInfoPacket, DkgPacket, SignalDkgPacket};
use crate::status::StatusSnapshot;

/// Progress update for a streaming chain-follow/check operation.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub current: u64,
    pub target: u64,
}

/// Node-local, operator-facing control surface (C10).
#[async_trait]
pub trait ControlService: Send + Sync {
    async fn init_dkg(&self, leader: bool) -> Result<GroupDescriptor>;
    async fn init_reshare(&self, leader: bool, force: bool) -> Result<GroupDescriptor>;
    async fn share(&self) -> Result<Vec<u8>>;
    async fn public_key(&self) -> Result<Vec<u8>>;
    async fn private_key(&self) -> Result<Vec<u8>>;
    async fn group_file(&self) -> Result<GroupDescriptor>;
    async fn backup_database(&self, destination: &str) -> Result<()>;
    async fn ping_pong(&self) -> Result<()>;
    async fn status(&self) -> Result<StatusSnapshot>;
    async fn remote_status(&self, peers: Vec<String>) -> Result<Vec<(String, bool)>>;
    async fn list_schemes(&self) -> Result<Vec<String>>;
    fn start_follow_chain(&self) -> BoxStream<'static, Result<SyncProgress>>;
    fn start_check_chain(&self) -> BoxStream<'static, Result<SyncProgress>>;
}

/// Node-to-node protocol surface, driven by C2/C3/C4/C7.
#[async_trait]
pub trait ProtocolService: Send + Sync {
    async fn broadcast_dkg(&self, packet: DkgPacket) -> Result<()>;
    async fn signal_dkg_participant(&self, packet: SignalDkgPacket) -> Result<()>;
    async fn push_dkg_info(&self, packet: DkgInfoPacket) -> Result<()>;
    async fn status(&self) -> Result<StatusSnapshot>;
    async fn home(&self) -> Result<()>;
    async fn chain_info(&self) -> Result<ChainInfo>;
}

#[derive(Debug, Clone)]
pub struct ChainInfo {
    pub genesis_time_ms: u64,
    pub period_secs: u64,
    pub group_hash: beacon_core::Hash32,
}
