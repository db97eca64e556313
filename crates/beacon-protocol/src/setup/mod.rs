//! C3/C4: leader-side collection of participants and follower-side
//! reception of the assembled group.

pub mod manager;
pub mod receiver;

pub use manager::{DeclaredParams, ReceiverHandle, SetupManager, SetupParams};
pub use receiver::SetupReceiver;
