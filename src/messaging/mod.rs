//! Coordination messaging: the message contract, the hub, and the
//! wallet-side client and dispatcher

pub mod client;
pub mod dispatcher;
pub mod hub;
pub mod messages;

pub use client::{MessageClient, Subscription};
pub use dispatcher::{MessageDispatcher, PendingWait};
pub use hub::{HubPublisher, MessageHub};
pub use messages::{
    AddedOutput, CommandKind, CoordinationMessage, SendRequest, TransactionEnvelope, TxRef,
};
