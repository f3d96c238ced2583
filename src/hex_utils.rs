//! Hex encoding helpers
//!
//! Every curve point and scalar that crosses the coordination protocol or
//! lands in the wallet database is hex-encoded. This module provides the
//! shared trait plus `serde` adapters for scalar fields.

use k256::elliptic_curve::PrimeField;
use k256::Scalar;

use crate::errors::CryptoError;

/// Types that have a canonical hex representation
pub trait HexEncodable: Sized {
    /// Encode to a lowercase hex string
    fn to_hex(&self) -> String;

    /// Decode from a hex string
    fn from_hex(hex: &str) -> Result<Self, CryptoError>;
}

/// Decode a hex string into a fixed-size byte array
pub fn hex_to_array<const N: usize>(hex: &str) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(CryptoError::InvalidHex(format!(
            "expected {N} bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Encode a scalar as 32 big-endian hex bytes
pub fn scalar_to_hex(scalar: &Scalar) -> String {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&scalar.to_repr());
    hex::encode(bytes)
}

/// Decode a scalar from hex, rejecting out-of-order values
pub fn scalar_from_hex(hex: &str) -> Result<Scalar, CryptoError> {
    let bytes = hex_to_array::<32>(hex)?;
    Option::<Scalar>::from(Scalar::from_repr(bytes.into()))
        .ok_or_else(|| CryptoError::InvalidScalar("value not in the scalar field".to_string()))
}

/// `serde` adapter for a single hex-encoded scalar field
pub mod scalar_hex {
    use k256::Scalar;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(scalar: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::scalar_to_hex(scalar))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let hex = String::deserialize(deserializer)?;
        super::scalar_from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// `serde` adapter for ring signature responses: a list of hex pairs
pub mod scalar_pairs_hex {
    use k256::Scalar;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        pairs: &[[Scalar; 2]],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: Vec<[String; 2]> = pairs
            .iter()
            .map(|[a, b]| [super::scalar_to_hex(a), super::scalar_to_hex(b)])
            .collect();
        serde::Serialize::serialize(&encoded, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<[Scalar; 2]>, D::Error> {
        let encoded = Vec::<[String; 2]>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|[a, b]| {
                Ok([
                    super::scalar_from_hex(&a).map_err(serde::de::Error::custom)?,
                    super::scalar_from_hex(&b).map_err(serde::de::Error::custom)?,
                ])
            })
            .collect()
    }
}
