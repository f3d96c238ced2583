//! Inbound message dispatcher
//!
//! A single task drains the hub subscription and demultiplexes messages by
//! `(transaction id, command)` into per-waiter oneshot channels. Waits are
//! bounded by a timeout, and anything no waiter claims flows out of a
//! fallback channel for the wallet's general-purpose inbound handling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{MessageError, WalletResult};
use crate::messaging::client::Subscription;
use crate::messaging::messages::{CommandKind, CoordinationMessage};

type WaiterKey = (u32, CommandKind);

#[derive(Default)]
struct WaiterTable {
    waiters: Mutex<HashMap<WaiterKey, oneshot::Sender<CoordinationMessage>>>,
}

/// Handle for registering correlated waits
#[derive(Clone)]
pub struct MessageDispatcher {
    table: Arc<WaiterTable>,
}

impl MessageDispatcher {
    /// Start draining `subscription`
    ///
    /// Returns the dispatcher handle, the fallback receiver for unclaimed
    /// messages, and the join handle of the drain task (which ends when
    /// the hub hangs up).
    pub fn spawn(
        mut subscription: Subscription,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<CoordinationMessage>,
        JoinHandle<()>,
    ) {
        let table = Arc::new(WaiterTable::default());
        let (fallback_tx, fallback_rx) = mpsc::unbounded_channel();

        let drain_table = Arc::clone(&table);
        let handle = tokio::spawn(async move {
            loop {
                match subscription.next_message().await {
                    Ok(Some(message)) => {
                        let key = (message.tx_id(), message.command());
                        let waiter = drain_table.waiters.lock().expect("waiter table lock").remove(&key);
                        match waiter {
                            Some(sender) => {
                                debug!("dispatching {} for tx {}", key.1, key.0);
                                let _ = sender.send(message);
                            }
                            None => {
                                // Not correlated with any active wait; the
                                // general-purpose inbound listener gets it.
                                let _ = fallback_tx.send(message);
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // Unknown command tags and malformed lines are
                        // rejected explicitly rather than silently ignored.
                        warn!("dropping undecodable broadcast message: {e}");
                    }
                }
            }
        });

        (Self { table }, fallback_rx, handle)
    }

    /// Register a waiter for `(tx_id, command)` without awaiting it yet
    ///
    /// Register before sending the message that provokes the reply; a
    /// reply that lands between the send and the await is then buffered
    /// in the waiter instead of leaking to the fallback channel.
    pub fn register(&self, tx_id: u32, command: CommandKind) -> PendingWait {
        let (sender, receiver) = oneshot::channel();
        self.table
            .waiters
            .lock()
            .expect("waiter table lock")
            .insert((tx_id, command), sender);
        PendingWait {
            table: Arc::clone(&self.table),
            key: (tx_id, command),
            receiver,
        }
    }

    /// Wait for the message matching `(tx_id, command)`, up to `timeout`
    pub async fn wait_for(
        &self,
        tx_id: u32,
        command: CommandKind,
        timeout: Duration,
    ) -> WalletResult<CoordinationMessage> {
        self.register(tx_id, command).recv(timeout).await
    }
}

/// A registered correlated wait, not yet awaited
pub struct PendingWait {
    table: Arc<WaiterTable>,
    key: WaiterKey,
    receiver: oneshot::Receiver<CoordinationMessage>,
}

impl PendingWait {
    /// Await the registered message, up to `timeout`
    pub async fn recv(self, timeout: Duration) -> WalletResult<CoordinationMessage> {
        let PendingWait {
            table,
            key,
            receiver,
        } = self;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(MessageError::ChannelClosed.into()),
            Err(_) => {
                table.waiters.lock().expect("waiter table lock").remove(&key);
                Err(MessageError::Timeout {
                    tx_id: key.0,
                    command: key.1.as_str(),
                }
                .into())
            }
        }
    }
}
