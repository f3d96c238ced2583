//! Schnorr signatures over the transaction kernel excess
//!
//! The challenge binds only the (combined) witness: `e = H(R)`. The
//! response uses the conventional equation `s = k + e*x`, so verification
//! is `s*G == R + e*P`. Both sides of the two-party protocol contribute a
//! partial response against the same challenge; the scheme is additively
//! homomorphic in the witness, the response and the key, which is what
//! makes the aggregate kernel signature verify as a single-key signature.

use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::crypto::commitment::{hash_to_scalar, point_hash_bytes, random_scalar};
use crate::data_structures::types::CompressedPoint;
use crate::errors::CryptoError;
use crate::hex_utils::scalar_hex;

/// A Schnorr signature: public nonce plus response scalar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrSignature {
    /// The public nonce `R` (for a two-party kernel, the combined nonce)
    pub witness: CompressedPoint,
    /// The response `s = k + e*x`
    #[serde(with = "scalar_hex")]
    pub response: Scalar,
}

/// The shared challenge `e = H(R)`
pub fn challenge(combined_witness: &ProjectivePoint) -> Scalar {
    hash_to_scalar(&[&point_hash_bytes(combined_witness)])
}

/// A party's response contribution: `s_i = k_i + e * x_i`
pub fn partial_response(nonce: &Scalar, challenge: &Scalar, secret: &Scalar) -> Scalar {
    nonce + &(challenge * secret)
}

/// Sign with a fresh nonce, producing a complete single-party signature
pub fn sign(secret: &Scalar) -> Result<SchnorrSignature, CryptoError> {
    let nonce = random_scalar();
    let witness_point = ProjectivePoint::GENERATOR * nonce;
    let e = challenge(&witness_point);
    Ok(SchnorrSignature {
        witness: CompressedPoint::compress(&witness_point)?,
        response: partial_response(&nonce, &e, secret),
    })
}

/// Verify `s*G == R + e*P` for the key `P`
pub fn verify(signature: &SchnorrSignature, key: &ProjectivePoint) -> bool {
    let witness = match signature.witness.decompress() {
        Ok(point) => point,
        Err(_) => return false,
    };
    let e = challenge(&witness);
    ProjectivePoint::GENERATOR * signature.response == witness + *key * e
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::Field;

    #[test]
    fn sign_and_verify() {
        let secret = random_scalar();
        let key = ProjectivePoint::GENERATOR * secret;
        let signature = sign(&secret).unwrap();
        assert!(verify(&signature, &key));
    }

    #[test]
    fn rejects_wrong_key() {
        let signature = sign(&random_scalar()).unwrap();
        let other_key = ProjectivePoint::GENERATOR * random_scalar();
        assert!(!verify(&signature, &other_key));
    }

    #[test]
    fn rejects_tampered_response() {
        let secret = random_scalar();
        let key = ProjectivePoint::GENERATOR * secret;
        let mut signature = sign(&secret).unwrap();
        signature.response += Scalar::ONE;
        assert!(!verify(&signature, &key));
    }

    #[test]
    fn partial_signatures_aggregate() {
        // Two parties, one shared challenge over the combined witness.
        let (x1, x2) = (random_scalar(), random_scalar());
        let (k1, k2) = (random_scalar(), random_scalar());
        let combined_witness = ProjectivePoint::GENERATOR * (k1 + k2);
        let e = challenge(&combined_witness);

        let s1 = partial_response(&k1, &e, &x1);
        let s2 = partial_response(&k2, &e, &x2);

        let aggregate = SchnorrSignature {
            witness: CompressedPoint::compress(&combined_witness).unwrap(),
            response: s1 + s2,
        };
        let combined_key = ProjectivePoint::GENERATOR * (x1 + x2);
        assert!(verify(&aggregate, &combined_key));
    }
}
