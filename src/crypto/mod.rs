//! Cryptographic primitives: Pedersen commitments, Schnorr kernel
//! signatures and the borromean ring signatures used by rangeproofs

pub mod commitment;
pub mod ring_signature;
pub mod schnorr;

pub use commitment::{commit, hash_to_scalar, point_hash_bytes, random_scalar, GENERATOR_H};
pub use ring_signature::{RingSignature, RING_WIDTH};
pub use schnorr::SchnorrSignature;
