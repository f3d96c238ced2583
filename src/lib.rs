//! Confidential transaction wallet libraries
//!
//! This crate provides a small confidential-transaction system built on
//! Pedersen commitments over secp256k1: an indexed commitment ledger with
//! a binary TCP protocol, binary-decomposition rangeproofs, a validating
//! transaction coordinator, a JSON-lines message hub, and the sender and
//! receiver halves of the two-party kernel signing exchange.
//!
//! The two binaries wire these together:
//!
//! - `coordinatord` runs the ledger store, the message hub and the
//!   coordinator in one process
//! - `wallet-cli` holds a wallet's outputs in SQLite and drives the
//!   exchange protocol over the hub

pub mod coordinator;
pub mod crypto;
pub mod data_structures;
pub mod errors;
pub mod hex_utils;
pub mod ledger;
pub mod messaging;
pub mod rangeproof;
pub mod wallet;

pub use coordinator::{Coordinator, TransactionOutcome};
pub use errors::*;
pub use hex_utils::*;
pub use rangeproof::{assign_output, verify_rangeproof, RangeProof};
pub use wallet::*;
