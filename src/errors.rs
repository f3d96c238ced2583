//! Error types for the confidential wallet libraries
//!
//! All fallible operations in this crate return [`WalletResult`], with
//! domain-specific sub-errors converted into the top-level [`WalletError`].

use thiserror::Error;

/// Result type used throughout the crate
pub type WalletResult<T> = Result<T, WalletError>;

/// Top-level error type for wallet and ledger operations
#[derive(Debug, Error)]
pub enum WalletError {
    /// Errors raised by the commitment record store
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Cryptographic validation failures (bad signature, bad rangeproof, excess mismatch)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Point or scalar encoding/decoding failures
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Coordination message protocol failures
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// Wallet database failures
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Requested spend exceeds the spendable balance
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Caller supplied an invalid argument (zero amount, empty destination, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<rusqlite::Error> for WalletError {
    fn from(e: rusqlite::Error) -> Self {
        WalletError::StorageError(e.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Ledger(LedgerError::Io(e))
    }
}

/// Errors raised by the commitment record store and its wire protocol
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Index is at or beyond `count()`
    #[error("Record index {index} out of range (count is {count})")]
    IndexOutOfRange { index: u32, count: u32 },

    /// The slot exists but holds a tombstone
    #[error("Record {0} is not live")]
    RecordNotLive(u32),

    /// Removing an already-removed record is a protocol error, not a
    /// recoverable runtime condition
    #[error("Record {0} was already removed")]
    DoubleRemove(u32),

    /// The stored record bytes do not hold a valid compressed point
    #[error("Record {0} is corrupt: {1}")]
    CorruptRecord(u32, String),

    /// A point headed for storage must carry a 0x02/0x03 SEC1 prefix;
    /// anything else would collide with the tombstone sentinel
    #[error("Point prefix {0:#04x} is not a valid compressed point prefix")]
    InvalidPointPrefix(u8),

    /// Malformed request or response frame
    #[error("Malformed ledger protocol frame: {0}")]
    MalformedFrame(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cryptographic validation failures
///
/// These are recoverable at the coordinator: the offending transaction is
/// dropped and no store mutation takes place.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// `Σ(outputs) − Σ(inputs)` does not equal the kernel excess
    #[error("Excess commitment does not match the transaction outputs minus inputs")]
    ExcessMismatch,

    /// The kernel signature does not verify against the kernel excess
    #[error("Kernel signature does not verify")]
    InvalidKernelSignature,

    /// A rangeproof failed its ring signature or homomorphic sum check
    #[error("Rangeproof invalid: {0}")]
    InvalidRangeProof(String),

    /// A transaction input references a missing or spent record
    #[error("Transaction input {0} is unknown or already spent")]
    UnknownInput(u32),

    /// The same input index appears twice in one transaction
    #[error("Transaction input {0} is listed more than once")]
    DuplicateInput(u32),

    /// Aggregated two-party kernel signature failed verification before broadcast
    #[error("Aggregated kernel signature does not verify; aborting exchange")]
    AggregateSignatureInvalid,
}

/// Point and scalar encoding failures
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid compressed point: {0}")]
    InvalidPoint(String),

    #[error("Invalid scalar: {0}")]
    InvalidScalar(String),

    /// The identity point has no 33-byte SEC1 compressed encoding
    #[error("Cannot encode the identity point")]
    IdentityPoint,

    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

/// Coordination message protocol failures
#[derive(Debug, Error)]
pub enum MessageError {
    /// Message could not be serialized or parsed; unknown command tags land here
    #[error("Failed to decode coordination message: {0}")]
    Decode(String),

    #[error("Failed to encode coordination message: {0}")]
    Encode(String),

    /// A correlated wait did not see a matching message in time
    #[error("Timed out waiting for {command} on transaction {tx_id}")]
    Timeout { tx_id: u32, command: &'static str },

    /// The dispatcher or hub connection went away
    #[error("Messaging channel closed")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A session nonce was requested twice or never established
    #[error("No receive session for transaction {0}")]
    UnknownSession(u32),
}
