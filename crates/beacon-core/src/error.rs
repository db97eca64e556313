//! Unified error taxonomy for the beacon control plane.
//!
//! One flat enum rather than a hierarchy per subsystem, matching the error
//! category map in the design ("Error taxonomy"): `Preempted`, `Timeout`,
//! `Invalid`, `NotReady`, `Conflict`, `PeerFailure`, `Fatal`.

use serde::{Deserialize, Serialize};

/// Unified error type for all beacon control-plane operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BeaconError {
    /// A newer leader-initiated session displaced this one. Must not clear
    /// in-memory session state — the preempting session owns cleanup.
    #[error("preempted by a newer session: {message}")]
    Preempted { message: String },

    /// A phase timer or wait bound fired.
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Malformed input, group invariant violation, or unknown index.
    #[error("invalid: {message}")]
    Invalid { message: String },

    /// The requested resource (beacon, group, share) is not yet available.
    #[error("not ready: {message}")]
    NotReady { message: String },

    /// DKG already completed, reshare already in progress without `force`,
    /// or a concurrent follow/session conflict.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// A remote RPC failed. Non-fatal below quorum thresholds.
    #[error("peer failure: {message}")]
    PeerFailure { message: String },

    /// Crypto engine failure, storage failure, or signature forgery.
    #[error("fatal: {message}")]
    Fatal { message: String },
}

impl BeaconError {
    pub fn preempted(message: impl Into<String>) -> Self {
        Self::Preempted { message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn peer_failure(message: impl Into<String>) -> Self {
        Self::PeerFailure { message: message.into() }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal { message: message.into() }
    }

    /// `PeerFailure` below a quorum threshold is the only class local code
    /// should swallow; everything else surfaces to the operator verbatim.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PeerFailure { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Preempted { .. } => "preempted",
            Self::Timeout { .. } => "timeout",
            Self::Invalid { .. } => "invalid",
            Self::NotReady { .. } => "not_ready",
            Self::Conflict { .. } => "conflict",
            Self::PeerFailure { .. } => "peer_failure",
            Self::Fatal { .. } => "fatal",
        }
    }
}

/// Standard result type for beacon control-plane operations.
pub type Result<T> = std::result::Result<T, BeaconError>;

impl From<bincode::Error> for BeaconError {
    fn from(err: bincode::Error) -> Self {
        Self::invalid(format!("encoding error: {err}"))
    }
}

impl From<std::io::Error> for BeaconError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_ready(err.to_string()),
            std::io::ErrorKind::TimedOut => Self::timeout(err.to_string()),
            _ => Self::fatal(err.to_string()),
        }
    }
}
