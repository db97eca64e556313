//! Shared serde helpers for canonical G1/G2 point encoding.

use bls12_381_plus::group::GroupEncoding;
use bls12_381_plus::{G1Affine, G1Projective, G2Affine, G2Projective};

pub mod g1 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(point: &G1Projective, s: S) -> Result<S::Ok, S::Error> {
        let affine = G1Affine::from(point);
        serde_bytes::serialize(affine.to_bytes().as_ref(), s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<G1Projective, D::Error> {
        let bytes: Vec<u8> = serde_bytes::deserialize(d)?;
        let mut repr = <G1Affine as GroupEncoding>::Repr::default();
        repr.as_mut().copy_from_slice(&bytes);
        let affine = Option::<G1Affine>::from(G1Affine::from_bytes(&repr))
            .ok_or_else(|| serde::de::Error::custom("invalid G1 point encoding"))?;
        Ok(G1Projective::from(affine))
    }
}

pub mod g2 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(point: &G2Projective, s: S) -> Result<S::Ok, S::Error> {
        let affine = G2Affine::from(point);
        serde_bytes::serialize(affine.to_bytes().as_ref(), s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<G2Projective, D::Error> {
        let bytes: Vec<u8> = serde_bytes::deserialize(d)?;
        let mut repr = <G2Affine as GroupEncoding>::Repr::default();
        repr.as_mut().copy_from_slice(&bytes);
        let affine = Option::<G2Affine>::from(G2Affine::from_bytes(&repr))
            .ok_or_else(|| serde::de::Error::custom("invalid G2 point encoding"))?;
        Ok(G2Projective::from(affine))
    }
}
