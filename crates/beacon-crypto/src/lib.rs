//! Pairing-based cryptography for the beacon control plane: the G1/G2/GT
//! suite, BLS packet signatures, and IBE timelock encryption to a future
//! round (C9). The DKG's own verifiable-secret-sharing algebra is an
//! external collaborator and is not implemented here.

pub mod encoding;
pub mod packet_sig;
pub mod suite;
pub mod timelock;

pub use packet_sig::{LongTermKeyPair, PublicKey, Signature};
pub use timelock::{decrypt, encrypt, Ciphertext};
