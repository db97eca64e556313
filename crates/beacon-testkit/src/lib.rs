//! In-process multi-node test harness: a deterministic clock, an
//! in-memory stand-in for the RPC substrate, and a trivial DKG engine
//! used to drive orchestration-level scenarios without real threshold
//! cryptography.

pub mod clock;
pub mod engine;
pub mod network;
pub mod node;
pub mod orchestrator_node;

pub use clock::FakeClock;
pub use engine::FakeDkgEngine;
pub use network::{InMemoryNetwork, Inbox};
pub use node::TestNode;
pub use orchestrator_node::OrchestratorNode;
