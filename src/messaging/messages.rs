//! Coordination protocol messages
//!
//! JSON messages of the form `{"command": ..., "tx": {"id": ...}}` flowing
//! over the hub's push and publish channels. The command tag is a closed
//! enum: unknown tags fail decoding instead of being silently ignored.

use serde::{Deserialize, Serialize};

use crate::data_structures::transaction::Transaction;
use crate::data_structures::types::{CompressedPoint, OutputIndex};
use crate::errors::MessageError;

/// Bare transaction id reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    pub id: u32,
}

/// Opening message of the two-party exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub id: u32,
    /// Name of the receiving party
    pub destination: String,
}

/// A transaction travelling inside a `send` or `broadcast` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub id: u32,
    pub destination: String,
    #[serde(flatten)]
    pub transaction: Transaction,
}

/// An `(index, point)` pair from the coordinator's `final` broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedOutput {
    pub index: OutputIndex,
    pub point: CompressedPoint,
}

/// The six coordination commands, tagged by `command`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CoordinationMessage {
    /// Sender → all: opens the exchange, naming a destination
    RequestSend { tx: SendRequest },
    /// Receiver → all: fresh public nonce for the named transaction
    RequestSendReply {
        tx: TxRef,
        witness: CompressedPoint,
    },
    /// Sender → all: partially signed transaction
    ///
    /// The kernel witness holds the combined nonce `R_S + R_R`; `witness`
    /// carries the sender's own nonce point so the receiver can check the
    /// combination.
    Send {
        tx: TransactionEnvelope,
        amount: u64,
        witness: CompressedPoint,
    },
    /// Receiver → coordinator: the finalized transaction
    Broadcast { tx: TransactionEnvelope },
    /// Coordinator → all: accepted placement of the transaction's effects
    Final {
        tx: TxRef,
        removed: Vec<OutputIndex>,
        added: Vec<AddedOutput>,
    },
}

impl CoordinationMessage {
    /// The transaction id this message refers to
    pub fn tx_id(&self) -> u32 {
        match self {
            CoordinationMessage::RequestSend { tx } => tx.id,
            CoordinationMessage::RequestSendReply { tx, .. } => tx.id,
            CoordinationMessage::Send { tx, .. } => tx.id,
            CoordinationMessage::Broadcast { tx } => tx.id,
            CoordinationMessage::Final { tx, .. } => tx.id,
        }
    }

    pub fn command(&self) -> CommandKind {
        match self {
            CoordinationMessage::RequestSend { .. } => CommandKind::RequestSend,
            CoordinationMessage::RequestSendReply { .. } => CommandKind::RequestSendReply,
            CoordinationMessage::Send { .. } => CommandKind::Send,
            CoordinationMessage::Broadcast { .. } => CommandKind::Broadcast,
            CoordinationMessage::Final { .. } => CommandKind::Final,
        }
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Encode(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        serde_json::from_str(json).map_err(|e| MessageError::Decode(e.to_string()))
    }
}

/// Command discriminant used for correlated waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    RequestSend,
    RequestSendReply,
    Send,
    Broadcast,
    Final,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::RequestSend => "request_send",
            CommandKind::RequestSendReply => "request_send_reply",
            CommandKind::Send => "send",
            CommandKind::Broadcast => "broadcast",
            CommandKind::Final => "final",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
