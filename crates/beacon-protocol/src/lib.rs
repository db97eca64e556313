//! DKG/resharing orchestration: the arrival-set, echo broadcaster, setup
//! manager/receiver, phaser, orchestrator, info push, status endpoints,
//! control entry points, and the wire/config/storage seams they sit on.

pub mod arrival;
pub mod broadcast;
pub mod config;
pub mod control;
pub mod dkg_engine;
pub mod group;
pub mod orchestrator;
pub mod packets;
pub mod phaser;
pub mod push;
pub mod rpc;
pub mod setup;
pub mod status;
pub mod storage;

pub use arrival::ArrivalSet;
pub use broadcast::{EchoBroadcaster, PeerSender};
pub use config::NodeConfig;
pub use control::NodeControl;
pub use dkg_engine::{Board, DkgEngine, DkgEngineConfig, DkgOutcome, DkgProtocol, GroupSigner, PacketSigner};
pub use group::{DistKeyPublic, GroupDescriptor, Identity, Node, SchemeId};
pub use orchestrator::{Orchestrator, SessionConfig, SessionView, SessionViewData};
pub use packets::{BundleKind, DkgInfoPacket, DkgPacket, SignalDkgPacket};
pub use phaser::{OutgoingAdapter, Phase, Phaser};
pub use push::{push_dkg_info, InfoPusher};
pub use setup::{SetupManager, SetupParams, SetupReceiver};
pub use status::{snapshot, BeaconState, ChainStoreState, DkgState, ReshareState, StatusSnapshot, StatusSource};
pub use storage::{KeyStore, MemoryKeyStore, MemoryShareStore, SharePersistence, ShareStore};
