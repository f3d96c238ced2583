//! Binary-decomposition rangeproofs
//!
//! Proves that a committed value lies in `[0, 2^64)` without revealing it.
//! The output blinding is split into 64 random sub-blindings, one per bit.
//! Bit `i` commits to `d_i*G` (bit clear) or `d_i*G + 2^i*H` (bit set), so
//! the set `{C_i, C_i - 2^i*H}` always contains exactly one point whose
//! discrete log the prover knows. One borromean ring signature over all 64
//! two-key rings proves that knowledge, and the homomorphic sum of the bit
//! commitments must reproduce the output commitment.

use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::crypto::commitment::{commit, random_scalar, GENERATOR_H};
use crate::crypto::ring_signature::{self, Ring, RingSignature};
use crate::data_structures::types::CompressedPoint;
use crate::errors::{ValidationError, WalletResult};

/// Number of bits proven, and therefore of rings in the proof
pub const PROOF_SIZE: usize = 64;

/// The rangeproof ring signature commits to a null message; the proof's
/// security comes from the rings themselves.
pub const NULL_MESSAGE: [u8; 32] = [0u8; 32];

/// A zero-knowledge proof that a commitment's value fits in 64 bits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    /// One commitment per bit of the value
    pub commitments: Vec<CompressedPoint>,
    /// Ring signature over the 64 two-key rings derived from the bit
    /// commitments
    pub signature: RingSignature,
}

/// A freshly assigned output: its blinding secret, commitment and proof
#[derive(Debug, Clone)]
pub struct OutputAssignment {
    /// Blinding scalar for the output commitment (the sum of the 64
    /// per-bit sub-blindings)
    pub blinding: Scalar,
    /// The output commitment `blinding*G + value*H`
    pub commitment: CompressedPoint,
    /// Proof that the committed value is in range
    pub rangeproof: RangeProof,
}

/// Rebuild the two-key ring for bit `i`: `{C_i, C_i - 2^i*H}`
fn bit_rings(bit_commitments: &[ProjectivePoint]) -> Vec<Ring> {
    bit_commitments
        .iter()
        .enumerate()
        .map(|(i, commitment)| {
            let value_point = *GENERATOR_H * Scalar::from(1u64 << i);
            [*commitment, *commitment - value_point]
        })
        .collect()
}

/// Create a new output commitment for `value` together with its rangeproof
pub fn assign_output(value: u64) -> WalletResult<OutputAssignment> {
    let mut blinding = Scalar::ZERO;
    let mut subkeys = Vec::with_capacity(PROOF_SIZE);
    for _ in 0..PROOF_SIZE {
        let subkey = random_scalar();
        blinding += subkey;
        subkeys.push(subkey);
    }

    let mut bit_commitments = Vec::with_capacity(PROOF_SIZE);
    let mut positions = Vec::with_capacity(PROOF_SIZE);
    for (i, subkey) in subkeys.iter().enumerate() {
        let bit = ((value >> i) & 1) as usize;
        bit_commitments.push(commit((bit as u64) << i, subkey));
        positions.push(bit);
    }

    let sum: ProjectivePoint = bit_commitments
        .iter()
        .fold(ProjectivePoint::IDENTITY, |acc, c| acc + c);
    debug_assert_eq!(sum, commit(value, &blinding));

    let rings = bit_rings(&bit_commitments);
    let signature = ring_signature::sign(&NULL_MESSAGE, &rings, &subkeys, &positions)?;

    let commitments = bit_commitments
        .iter()
        .map(CompressedPoint::compress)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OutputAssignment {
        blinding,
        commitment: CompressedPoint::compress(&sum)?,
        rangeproof: RangeProof {
            commitments,
            signature,
        },
    })
}

/// Verify a rangeproof against the output commitment it claims to cover
///
/// Any mismatch is a hard proof-invalid result; there is no retry.
pub fn verify_rangeproof(
    commitment: &CompressedPoint,
    proof: &RangeProof,
) -> Result<(), ValidationError> {
    if proof.commitments.len() != PROOF_SIZE {
        return Err(ValidationError::InvalidRangeProof(format!(
            "expected {PROOF_SIZE} bit commitments, got {}",
            proof.commitments.len()
        )));
    }

    let bit_commitments = proof
        .commitments
        .iter()
        .map(|c| c.decompress())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ValidationError::InvalidRangeProof(e.to_string()))?;

    let rings = bit_rings(&bit_commitments);
    if !ring_signature::verify(&NULL_MESSAGE, &rings, &proof.signature) {
        return Err(ValidationError::InvalidRangeProof(
            "ring signature does not verify".to_string(),
        ));
    }

    let sum: ProjectivePoint = bit_commitments
        .iter()
        .fold(ProjectivePoint::IDENTITY, |acc, c| acc + c);
    let claimed = commitment
        .decompress()
        .map_err(|e| ValidationError::InvalidRangeProof(e.to_string()))?;
    if sum != claimed {
        return Err(ValidationError::InvalidRangeProof(
            "bit commitments do not sum to the output commitment".to_string(),
        ));
    }

    Ok(())
}
