//! Core curve point types shared across the ledger, wallet and protocol

use std::fmt::{Debug, Display, Formatter};

use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::CryptoError;
use crate::hex_utils::{hex_to_array, HexEncodable};

/// Index of a commitment record in the ledger
pub type OutputIndex = u32;

/// Size in bytes of a SEC1 compressed secp256k1 point
pub const COMPRESSED_POINT_SIZE: usize = 33;

/// A 33-byte SEC1 compressed secp256k1 point
///
/// This is the wire and storage representation of every commitment in the
/// system. The leading byte is always `0x02` or `0x03`, which the record
/// store exploits as a liveness sentinel (`0x00` marks a tombstone).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedPoint([u8; COMPRESSED_POINT_SIZE]);

impl CompressedPoint {
    /// Wrap raw bytes without validating that they decode to a curve point
    pub fn from_bytes(bytes: [u8; COMPRESSED_POINT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Wrap a byte slice, checking only the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != COMPRESSED_POINT_SIZE {
            return Err(CryptoError::InvalidPoint(format!(
                "expected {COMPRESSED_POINT_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; COMPRESSED_POINT_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; COMPRESSED_POINT_SIZE] {
        &self.0
    }

    /// The SEC1 prefix byte (`0x02` or `0x03` for a valid compressed point)
    pub fn prefix(&self) -> u8 {
        self.0[0]
    }

    /// Compress a projective point
    ///
    /// Fails on the identity point, which has no 33-byte compressed form.
    pub fn compress(point: &ProjectivePoint) -> Result<Self, CryptoError> {
        if point == &ProjectivePoint::IDENTITY {
            return Err(CryptoError::IdentityPoint);
        }
        let encoded = point.to_affine().to_encoded_point(true);
        Self::from_slice(encoded.as_bytes())
    }

    /// Decompress into a projective point, validating curve membership
    pub fn decompress(&self) -> Result<ProjectivePoint, CryptoError> {
        let encoded = EncodedPoint::from_bytes(self.0)
            .map_err(|e| CryptoError::InvalidPoint(e.to_string()))?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or_else(|| CryptoError::InvalidPoint("not a point on the curve".to_string()))?;
        Ok(ProjectivePoint::from(affine))
    }
}

impl HexEncodable for CompressedPoint {
    fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        Ok(Self(hex_to_array::<COMPRESSED_POINT_SIZE>(hex)?))
    }
}

impl Display for CompressedPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for CompressedPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompressedPoint({})", self.to_hex())
    }
}

impl Serialize for CompressedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CompressedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
