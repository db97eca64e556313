//! Wire packet formats (§6): DKG bundles, the recruitment signal, and the
//! pushed group-info packet. The bundle payloads themselves are opaque
//! blobs produced by the external DKG engine; this crate only adds the
//! originator index, content hash, and the envelope signature.

use beacon_core::{BeaconError, Hash32, NodeIndex, Result};
use beacon_crypto::Signature;
use serde::{Deserialize, Serialize};

/// Which phase of the DKG a bundle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleKind {
    Deal,
    Response,
    Justification,
}

/// One DKG protocol packet: a dealer/response/justification bundle signed
/// by its originator.
#[derive(Clone, Serialize, Deserialize)]
pub struct DkgPacket {
    pub kind: BundleKind,
    pub dealer_index: NodeIndex,
    pub payload: Vec<u8>,
    pub signature: Signature,
}

impl DkgPacket {
    /// Content hash used for arrival-set deduplication, computed over the
    /// kind, dealer index, and payload (not the signature, so a re-signed
    /// copy of the same content still dedups).
    pub fn content_hash(&self) -> Result<Hash32> {
        let bytes = bincode::serialize(&(self.kind, self.dealer_index, &self.payload))
            .map_err(BeaconError::from)?;
        Ok(Hash32::of(&bytes))
    }
}

/// Follower -> leader: "here is my identity, let me into the group".
#[derive(Clone, Serialize, Deserialize)]
pub struct SignalDkgPacket {
    pub node_address: String,
    pub node_tls: bool,
    pub secret_proof: Vec<u8>,
    pub previous_group_hash: Option<Hash32>,
}

/// Leader -> followers: the assembled, signed group descriptor.
#[derive(Clone, Serialize, Deserialize)]
pub struct DkgInfoPacket {
    pub group_bytes: Vec<u8>,
    pub secret_proof: Vec<u8>,
    pub dkg_timeout_secs: u64,
    pub leader_signature: Signature,
}
