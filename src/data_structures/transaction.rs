//! Transaction, kernel and output types
//!
//! A transaction is transient: the sender constructs it, the coordinator
//! consumes it, and only its effects on the commitment store persist.

use k256::ProjectivePoint;
use serde::{Deserialize, Serialize};

use crate::crypto::schnorr::{self, SchnorrSignature};
use crate::data_structures::types::{CompressedPoint, OutputIndex};
use crate::errors::WalletResult;
use crate::rangeproof::RangeProof;

/// A newly created output: its commitment and the proof that the hidden
/// value is in range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// The homomorphic commitment representing the output amount
    #[serde(rename = "output")]
    pub commitment: CompressedPoint,
    /// Proof that the committed value fits in 64 bits
    pub rangeproof: RangeProof,
}

/// The signed, fee-bearing summary of a transaction
///
/// Conservation of value requires
/// `excess == Σ(output commitments) − Σ(input commitments)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionKernel {
    pub fee: u64,
    /// The net excess commitment, outputs minus inputs
    pub excess: CompressedPoint,
    /// Schnorr signature over the excess
    pub signature: SchnorrSignature,
}

impl TransactionKernel {
    /// Verify the kernel signature against the excess alone
    pub fn verify(&self) -> WalletResult<bool> {
        let excess = self.excess.decompress()?;
        Ok(schnorr::verify(&self.signature, &excess))
    }
}

/// A complete transaction: spent input indices, new outputs, and a kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ledger indices of the commitments being spent
    pub inputs: Vec<OutputIndex>,
    pub outputs: Vec<TransactionOutput>,
    pub kernel: TransactionKernel,
}

impl Transaction {
    /// Homomorphic sum of the output commitments
    pub fn output_sum(&self) -> WalletResult<ProjectivePoint> {
        let mut sum = ProjectivePoint::IDENTITY;
        for output in &self.outputs {
            sum += output.commitment.decompress()?;
        }
        Ok(sum)
    }
}
