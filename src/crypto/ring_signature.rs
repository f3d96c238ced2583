//! Borromean ring signatures over two-key rings
//!
//! The rangeproof needs one OR-proof per bit: "I know the discrete log of
//! exactly one of these two points". All 64 rings share a single challenge
//! scalar, so the whole proof carries one challenge plus two response
//! scalars per ring.
//!
//! Construction (AOS style): each ring is walked from index 0 using the
//! shared challenge as its starting `e`, with `e' = H(M || s*G - e*P)`
//! between members. The signer seeds the walk from its known index with a
//! fresh nonce, collects the closing nonce point of every ring, hashes all
//! of them into the shared challenge, then solves the response at the
//! known index so the walk closes.

use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::crypto::commitment::{hash_to_scalar, point_hash_bytes, random_scalar};
use crate::errors::CryptoError;
use crate::hex_utils::{scalar_hex, scalar_pairs_hex};

/// Number of keys in each ring
pub const RING_WIDTH: usize = 2;

/// A multi-ring signature with one shared challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingSignature {
    /// The challenge shared by every ring
    #[serde(with = "scalar_hex")]
    pub challenge: Scalar,
    /// Two response scalars per ring
    #[serde(with = "scalar_pairs_hex")]
    pub proofs: Vec<[Scalar; 2]>,
}

/// One two-key ring
pub type Ring = [ProjectivePoint; RING_WIDTH];

/// Hash binding the message and the full set of ring keys
fn ring_digest(message: &[u8; 32], rings: &[Ring]) -> Vec<u8> {
    let mut parts: Vec<u8> = message.to_vec();
    for ring in rings {
        for key in ring {
            parts.extend_from_slice(&point_hash_bytes(key));
        }
    }
    parts
}

/// Link hash between ring members: `e' = H(M || R)`
fn link(digest: &[u8], nonce_point: &ProjectivePoint) -> Scalar {
    hash_to_scalar(&[digest, &point_hash_bytes(nonce_point)])
}

/// Shared challenge from the closing nonce point of every ring
fn shared_challenge(digest: &[u8], closers: &[ProjectivePoint]) -> Scalar {
    let mut parts: Vec<u8> = digest.to_vec();
    for point in closers {
        parts.extend_from_slice(&point_hash_bytes(point));
    }
    hash_to_scalar(&[&parts])
}

/// Sign `message` knowing, for each ring `i`, the secret key of the member
/// at `positions[i]`.
pub fn sign(
    message: &[u8; 32],
    rings: &[Ring],
    secrets: &[Scalar],
    positions: &[usize],
) -> Result<RingSignature, CryptoError> {
    if rings.len() != secrets.len() || rings.len() != positions.len() {
        return Err(CryptoError::InvalidScalar(
            "ring, secret and position counts differ".to_string(),
        ));
    }
    let digest = ring_digest(message, rings);

    let nonces: Vec<Scalar> = rings.iter().map(|_| random_scalar()).collect();
    let mut proofs: Vec<[Scalar; 2]> = rings
        .iter()
        .map(|_| [random_scalar(), random_scalar()])
        .collect();

    // First pass: walk each ring forward from the known index to its
    // closing nonce point, which feeds the shared challenge.
    let mut closers = Vec::with_capacity(rings.len());
    for (i, ring) in rings.iter().enumerate() {
        let nonce_point = ProjectivePoint::GENERATOR * nonces[i];
        let closer = match positions[i] {
            0 => {
                let e1 = link(&digest, &nonce_point);
                ProjectivePoint::GENERATOR * proofs[i][1] - ring[1] * e1
            }
            1 => nonce_point,
            p => {
                return Err(CryptoError::InvalidScalar(format!(
                    "ring position {p} out of range"
                )))
            }
        };
        closers.push(closer);
    }
    let challenge = shared_challenge(&digest, &closers);

    // Second pass: walk from index 0 with the shared challenge and solve
    // the response at the known index so the walk reproduces the closer.
    for (i, ring) in rings.iter().enumerate() {
        let mut e = challenge;
        for t in 0..RING_WIDTH {
            if t == positions[i] {
                proofs[i][t] = nonces[i] + e * secrets[i];
            }
            if t + 1 < RING_WIDTH {
                let nonce_point = ProjectivePoint::GENERATOR * proofs[i][t] - ring[t] * e;
                e = link(&digest, &nonce_point);
            }
        }
    }

    Ok(RingSignature { challenge, proofs })
}

/// Verify the signature against the rings and message
pub fn verify(message: &[u8; 32], rings: &[Ring], signature: &RingSignature) -> bool {
    if signature.proofs.len() != rings.len() {
        return false;
    }
    let digest = ring_digest(message, rings);

    let mut closers = Vec::with_capacity(rings.len());
    for (i, ring) in rings.iter().enumerate() {
        let mut e = signature.challenge;
        let mut nonce_point = ProjectivePoint::IDENTITY;
        for t in 0..RING_WIDTH {
            nonce_point = ProjectivePoint::GENERATOR * signature.proofs[i][t] - ring[t] * e;
            if t + 1 < RING_WIDTH {
                e = link(&digest, &nonce_point);
            }
        }
        closers.push(nonce_point);
    }
    shared_challenge(&digest, &closers) == signature.challenge
}
