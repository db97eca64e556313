//! The group descriptor and node identity: §3 of the design.

use beacon_core::{BeaconError, Hash32, NodeIndex, Result};
use beacon_crypto::PublicKey;
use bls12_381_plus::group::GroupEncoding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A node's address, TLS flag, and long-term public key, plus a signature
/// over its own canonical encoding.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub address: String,
    pub tls: bool,
    pub public_key: PublicKey,
}

impl Identity {
    /// Canonical encoding fed to signing and hashing. Address and TLS flag
    /// first so two identities with the same key but different transport
    /// are never conflated.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&(&self.address, self.tls, &self.public_key.0.to_bytes().to_vec()))
            .map_err(BeaconError::from)
    }
}

/// One member of a group descriptor: identity plus assigned index.
#[derive(Clone, Serialize, Deserialize)]
pub struct Node {
    pub index: NodeIndex,
    pub identity: Identity,
}

/// The scheme identifier carried by a group descriptor (e.g. which
/// pairing-based signature scheme the group's coefficients are in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeId(pub u16);

/// A distributed public key: T coefficients in G1, element 0 is the master
/// public key `Ppub` that the timelock encrypts against.
#[derive(Clone, Serialize, Deserialize)]
pub struct DistKeyPublic {
    pub coefficients: Vec<PublicKey>,
}

impl DistKeyPublic {
    pub fn master(&self) -> Option<&PublicKey> {
        self.coefficients.first()
    }
}

/// The canonical, signed tuple describing a participant set, threshold,
/// timing, and shared master public key.
#[derive(Clone, Serialize, Deserialize)]
pub struct GroupDescriptor {
    pub nodes: Vec<Node>,
    pub threshold: u32,
    pub period_secs: u64,
    pub catchup_period_secs: u64,
    pub genesis_time_ms: u64,
    pub transition_time_ms: Option<u64>,
    pub genesis_seed: Hash32,
    pub scheme: SchemeId,
    pub public_key: DistKeyPublic,
}

impl GroupDescriptor {
    /// A placeholder "outgoing" group for a fresh DKG, which has no prior
    /// group to transition from: no members, so the info-push threshold
    /// on this side is trivially satisfied.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            threshold: 0,
            period_secs: 1,
            catchup_period_secs: 1,
            genesis_time_ms: 0,
            transition_time_ms: None,
            genesis_seed: Hash32::of(b""),
            scheme: SchemeId(0),
            public_key: DistKeyPublic { coefficients: Vec::new() },
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_at(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.iter().find(|n| n.index == index)
    }

    pub fn index_of(&self, address: &str) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .find(|n| n.identity.address == address)
            .map(|n| n.index)
    }

    /// Canonical byte encoding, the input to both echo-broadcast
    /// deduplication and the DKG nonce.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut addresses: Vec<(u32, &str)> = self
            .nodes
            .iter()
            .map(|n| (n.index.0, n.identity.address.as_str()))
            .collect();
        addresses.sort_by_key(|(i, _)| *i);
        bincode::serialize(&(
            &addresses,
            self.threshold,
            self.period_secs,
            self.catchup_period_secs,
            self.genesis_time_ms,
            self.transition_time_ms,
            self.genesis_seed,
            self.scheme,
        ))
        .map_err(BeaconError::from)
    }

    pub fn hash(&self) -> Result<Hash32> {
        Ok(Hash32::of(&self.canonical_bytes()?))
    }

    /// §3 invariants: indices are a permutation of `1..=N`, addresses are
    /// unique, `T >= floor(N/2) + 1`, `period > 0`.
    pub fn validate(&self) -> Result<()> {
        let n = self.nodes.len();
        if n == 0 {
            return Err(BeaconError::invalid("group has no nodes"));
        }
        if self.period_secs == 0 {
            return Err(BeaconError::invalid("period must be > 0"));
        }

        let mut indices: Vec<u32> = self.nodes.iter().map(|node| node.index.0).collect();
        indices.sort_unstable();
        let expected: Vec<u32> = (1..=n as u32).collect();
        if indices != expected {
            return Err(BeaconError::invalid(
                "node indices are not a permutation of 1..N",
            ));
        }

        let mut addresses = BTreeSet::new();
        for node in &self.nodes {
            if !addresses.insert(node.identity.address.clone()) {
                return Err(BeaconError::invalid(format!(
                    "duplicate address {}",
                    node.identity.address
                )));
            }
        }

        let min_threshold = n as u32 / 2 + 1;
        if self.threshold < min_threshold {
            return Err(BeaconError::invalid(format!(
                "threshold {} below minimum {}",
                self.threshold, min_threshold
            )));
        }

        Ok(())
    }
}

/// §3: across a reshare from `old` to `new`, genesis time, period, scheme,
/// and genesis seed must be preserved, and the new transition time must be
/// strictly in the future of `now_ms`.
pub fn validate_group_transition(
    old: &GroupDescriptor,
    new: &GroupDescriptor,
    now_ms: u64,
) -> Result<()> {
    old.validate()?;
    new.validate()?;

    if old.genesis_time_ms != new.genesis_time_ms {
        return Err(BeaconError::invalid(
            "reshare must preserve genesis time",
        ));
    }
    if old.period_secs != new.period_secs {
        return Err(BeaconError::invalid("reshare must preserve period"));
    }
    if old.scheme != new.scheme {
        return Err(BeaconError::invalid("reshare must preserve scheme"));
    }
    if old.genesis_seed != new.genesis_seed {
        return Err(BeaconError::invalid(
            "reshare must preserve genesis seed",
        ));
    }

    match new.transition_time_ms {
        Some(t) if t > now_ms => Ok(()),
        Some(_) => Err(BeaconError::invalid(
            "reshare transition time must be strictly in the future",
        )),
        None => Err(BeaconError::invalid(
            "reshare requires a transition time",
        )),
    }
}
