//! Wallet-owned output records

use k256::Scalar;
use serde::{Deserialize, Serialize};

use crate::data_structures::types::{CompressedPoint, OutputIndex};
use crate::hex_utils::scalar_hex;

/// An output the wallet can spend (or is waiting to see confirmed)
///
/// `index` stays `None` until the coordinator's `final` broadcast names
/// this commitment, at which point the wallet records its ledger placement.
/// Spending deletes the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOutput {
    /// Ledger index, populated once confirmed
    pub index: Option<OutputIndex>,
    /// The public commitment (unique per wallet)
    pub commitment: CompressedPoint,
    /// The blinding scalar mixed into the commitment
    #[serde(with = "scalar_hex")]
    pub blinding: Scalar,
    /// The hidden value
    pub value: u64,
}

impl WalletOutput {
    pub fn new(commitment: CompressedPoint, blinding: Scalar, value: u64) -> Self {
        Self {
            index: None,
            commitment,
            blinding,
            value,
        }
    }

    /// Whether the coordinator has confirmed this output's placement
    pub fn is_confirmed(&self) -> bool {
        self.index.is_some()
    }
}
