//! The pairing suite: two groups G1/G2, a bilinear pairing, and hash-to-G2.
//!
//! Concrete curve is BLS12-381 via `bls12_381_plus`, chosen over the plain
//! `bls12_381` crate because its `Gt` implements `GroupEncoding` — we need
//! canonical bytes out of a pairing output to feed the timelock's XOF, and
//! upstream `bls12_381` deliberately leaves `Gt` unencodable.

use bls12_381_plus::elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use bls12_381_plus::group::{Curve, GroupEncoding};
use bls12_381_plus::{G1Affine, G1Projective, G2Affine, G2Projective, Gt, Scalar};
use rand_core::{CryptoRng, RngCore};

/// Domain separation tag for hashing round numbers into G2, per the
/// ciphersuite convention of binding every hash-to-curve call to a fixed
/// application string.
pub const ROUND_DST: &[u8] = b"BEACON-TIMELOCK-BLS12381G2-ROUND";

/// Domain separation tag for hashing packet payloads before signing.
pub const PACKET_SIG_DST: &[u8] = b"BEACON-DKG-PACKET-BLS12381G2-SIG";

pub fn random_scalar(rng: &mut (impl RngCore + CryptoRng)) -> Scalar {
    Scalar::random(rng)
}

pub fn g1_generator() -> G1Projective {
    G1Projective::GENERATOR
}

pub fn g2_generator() -> G2Projective {
    G2Projective::GENERATOR
}

/// The bilinear map `e: G1 x G2 -> GT`.
pub fn pairing(g1: &G1Affine, g2: &G2Affine) -> Gt {
    bls12_381_plus::pairing(g1, g2)
}

/// Hash an arbitrary message into G2, domain-separated by `dst`.
pub fn hash_to_g2(msg: &[u8], dst: &[u8]) -> G2Projective {
    G2Projective::hash::<ExpandMsgXmd<sha2::Sha256>>(msg, dst)
}

/// Hash a beacon round number into its G2 identity point, `id = H(R)`.
pub fn round_identity(round: u64) -> G2Projective {
    hash_to_g2(&round.to_be_bytes(), ROUND_DST)
}

/// Turn a GT element into XOF seed bytes for `H2`.
pub fn gt_to_bytes(gt: &Gt) -> Vec<u8> {
    gt.to_bytes().as_ref().to_vec()
}

pub fn g1_affine(p: &G1Projective) -> G1Affine {
    p.to_affine()
}

pub fn g2_affine(p: &G2Projective) -> G2Affine {
    p.to_affine()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_identity_is_deterministic() {
        assert_eq!(round_identity(42).to_bytes(), round_identity(42).to_bytes());
    }

    #[test]
    fn distinct_rounds_hash_differently() {
        assert_ne!(round_identity(1).to_bytes(), round_identity(2).to_bytes());
    }

    #[test]
    fn pairing_is_bilinear_under_scalar_exponent() {
        // e(aP, Q) == e(P, aQ)
        let mut rng = rand::rngs::OsRng;
        let a = random_scalar(&mut rng);
        let p = g1_generator();
        let q = g2_generator();
        let lhs = pairing(&g1_affine(&(p * a)), &g2_affine(&q));
        let rhs = pairing(&g1_affine(&p), &g2_affine(&(q * a)));
        assert_eq!(gt_to_bytes(&lhs), gt_to_bytes(&rhs));
    }
}
