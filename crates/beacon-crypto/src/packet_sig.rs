//! BLS signatures over G1 long-term keys, used to sign and verify DKG
//! packets, identities, and group descriptors.
//!
//! `sign`/`verify` implement the standard single-message BLS scheme:
//! `pk = sk * g1_generator()`, `sig = sk * H(msg)`, verified by
//! `e(pk, H(msg)) == e(g1_generator(), sig)`.

use crate::suite::{self, PACKET_SIG_DST};
use beacon_core::BeaconError;
use bls12_381_plus::{G1Projective, G2Projective, Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// A long-term keypair: secret scalar plus its G1 public point.
#[derive(Clone)]
pub struct LongTermKeyPair {
    secret: Scalar,
    public: G1Projective,
}

impl LongTermKeyPair {
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let secret = suite::random_scalar(rng);
        let public = suite::g1_generator() * secret;
        Self { secret, public }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public)
    }

    /// Sign an arbitrary payload (e.g. a DKG packet's content hash, or a
    /// group descriptor's canonical hash).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let h = suite::hash_to_g2(message, PACKET_SIG_DST);
        Signature(h * self.secret)
    }
}

/// A node's long-term public key, carried on its `Identity`.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "crate::encoding::g1")] pub G1Projective);

impl PublicKey {
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), BeaconError> {
        let h = suite::hash_to_g2(message, PACKET_SIG_DST);
        let lhs = suite::pairing(&suite::g1_affine(&self.0), &suite::g2_affine(&h));
        let rhs = suite::pairing(
            &suite::g1_affine(&suite::g1_generator()),
            &suite::g2_affine(&signature.0),
        );
        if suite::gt_to_bytes(&lhs) == suite::gt_to_bytes(&rhs) {
            Ok(())
        } else {
            Err(BeaconError::fatal("signature verification failed"))
        }
    }
}

/// A BLS signature (element of G2).
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "crate::encoding::g2")] pub G2Projective);
