//! Identity-based encryption to a future beacon round (C9).
//!
//! Ciphertext for `m` under round `R` is `(U = rP, V = m XOR H2(e(Ppub, r*id)))`
//! for a random scalar `r` and `id = H(R)`. Decryption uses the round's BLS
//! signature `sigma = s*id`, recovering `m = V XOR H2(e(U, sigma))` since
//! `e(U, sigma) = e(rP, s*id) = e(Ppub, id)^r` by bilinearity.
//!
//! No integrity tag is added: decrypting with the wrong round's signature
//! silently yields unrelated bytes. Callers who need tamper-evidence must
//! add their own MAC over the plaintext before encrypting.

use crate::suite::{self, round_identity};
use bls12_381_plus::{G1Projective, G2Projective};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Ciphertext produced by [`encrypt`].
#[derive(Clone, Serialize, Deserialize)]
pub struct Ciphertext {
    #[serde(with = "crate::encoding::g1")]
    u: G1Projective,
    v: Vec<u8>,
}

/// Derive the XOF seed from a pairing output and expand it to `len` bytes.
fn h2(seed: &[u8], len: usize) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_derive_key("beacon-timelock-h2");
    hasher.update(seed);
    let mut xof = hasher.finalize_xof();
    let mut out = vec![0u8; len];
    xof.fill(&mut out);
    out
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// Encrypt `message` so it can only be opened with round `round`'s beacon
/// signature, under the group's master public key `ppub` (element 0 of the
/// distributed public key).
pub fn encrypt(
    ppub: G1Projective,
    round: u64,
    message: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Ciphertext {
    let r = suite::random_scalar(rng);
    let id = round_identity(round);
    let u = suite::g1_generator() * r;
    let shared = suite::pairing(&suite::g1_affine(&ppub), &suite::g2_affine(&(id * r)));
    let mask = h2(&suite::gt_to_bytes(&shared), message.len());
    let v = xor(message, &mask);
    Ciphertext { u, v }
}

/// Decrypt `ciphertext` using the round signature `sigma = s * id` produced
/// by the beacon once that round has been published.
pub fn decrypt(ciphertext: &Ciphertext, round_signature: G2Projective) -> Vec<u8> {
    let shared = suite::pairing(
        &suite::g1_affine(&ciphertext.u),
        &suite::g2_affine(&round_signature),
    );
    let mask = h2(&suite::gt_to_bytes(&shared), ciphertext.v.len());
    xor(&ciphertext.v, &mask)
}
