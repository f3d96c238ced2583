//! Pedersen commitments over secp256k1
//!
//! A commitment to value `v` with blinding scalar `d` is `d*G + v*H`,
//! where `G` is the secp256k1 base point and `H` is a fixed second
//! generator with unknown discrete log relative to `G`. Commitments are
//! homomorphically additive, which is what makes the conservation-of-value
//! check possible without revealing any amounts.

use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::Field;
use k256::{ProjectivePoint, Scalar, U256};
use lazy_static::lazy_static;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::data_structures::types::CompressedPoint;
use crate::hex_utils::HexEncodable;

/// Hex encoding of the value generator `H`
const GENERATOR_H_HEX: &str = "02182f2b3da9f6a8538dabac0e4208bad135e93b8f4824c54f2fa1b974ece63762";

lazy_static! {
    /// The value generator `H`
    pub static ref GENERATOR_H: ProjectivePoint = CompressedPoint::from_hex(GENERATOR_H_HEX)
        .expect("H generator literal is valid hex")
        .decompress()
        .expect("H generator literal is a curve point");
}

/// Commit to `value` with the given blinding scalar: `blinding*G + value*H`
pub fn commit(value: u64, blinding: &Scalar) -> ProjectivePoint {
    ProjectivePoint::GENERATOR * blinding + *GENERATOR_H * Scalar::from(value)
}

/// A uniformly random non-zero scalar for use as a blinding factor or nonce
pub fn random_scalar() -> Scalar {
    loop {
        let scalar = Scalar::random(&mut OsRng);
        if scalar != Scalar::ZERO {
            return scalar;
        }
    }
}

/// SEC1 bytes of a point for hashing purposes
///
/// Unlike [`CompressedPoint::compress`] this accepts the identity point,
/// which encodes as a single zero byte. Challenge hashes must be computable
/// for any point an adversary can make us derive.
pub fn point_hash_bytes(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Hash arbitrary byte strings to a scalar via SHA-256
pub fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    <Scalar as Reduce<U256>>::reduce(U256::from_be_slice(&digest))
}
