//! Core data structures: curve point wrappers, transactions and wallet
//! output records

pub mod transaction;
pub mod types;
pub mod wallet_output;

pub use transaction::{Transaction, TransactionKernel, TransactionOutput};
pub use types::{CompressedPoint, OutputIndex, COMPRESSED_POINT_SIZE};
pub use wallet_output::WalletOutput;
