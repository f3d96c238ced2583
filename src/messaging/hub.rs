//! The coordination hub: a push/pull inbox plus a fan-out publisher
//!
//! Clients push JSON lines at the inbox. A `broadcast` command is handed
//! to the coordinator; every other valid message is re-published verbatim
//! to all subscribers. The coordinator is the only publisher of `final`
//! messages, via [`HubPublisher`].

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::errors::{MessageError, WalletResult};
use crate::messaging::messages::{CoordinationMessage, TransactionEnvelope};

const PUBLISH_BACKLOG: usize = 256;

/// Fan-out handle used by the coordinator to publish `final` messages
#[derive(Clone)]
pub struct HubPublisher {
    publish_tx: broadcast::Sender<String>,
}

impl HubPublisher {
    pub fn publish(&self, message: &CoordinationMessage) -> WalletResult<()> {
        // No subscribers is fine; the broadcast is fan-out only.
        let _ = self.publish_tx.send(message.to_json()?);
        Ok(())
    }
}

/// The message hub
pub struct MessageHub {
    push_listener: TcpListener,
    subscribe_listener: TcpListener,
    publish_tx: broadcast::Sender<String>,
    broadcast_tx: mpsc::Sender<TransactionEnvelope>,
}

impl MessageHub {
    /// Build a hub on pre-bound listeners
    ///
    /// Returns the hub plus the channel on which finalized transactions
    /// reach the coordinator.
    pub fn new(
        push_listener: TcpListener,
        subscribe_listener: TcpListener,
    ) -> (Self, mpsc::Receiver<TransactionEnvelope>) {
        let (publish_tx, _) = broadcast::channel(PUBLISH_BACKLOG);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(16);
        (
            Self {
                push_listener,
                subscribe_listener,
                publish_tx,
                broadcast_tx,
            },
            broadcast_rx,
        )
    }

    pub fn publisher(&self) -> HubPublisher {
        HubPublisher {
            publish_tx: self.publish_tx.clone(),
        }
    }

    /// Accept pushers and subscribers forever
    pub async fn run(self) -> WalletResult<()> {
        info!(
            "hub accepting pushes on {} and subscriptions on {}",
            self.push_listener.local_addr().map_err(MessageError::from)?,
            self.subscribe_listener
                .local_addr()
                .map_err(MessageError::from)?
        );

        let publish_tx = self.publish_tx.clone();
        let broadcast_tx = self.broadcast_tx.clone();
        let push_listener = self.push_listener;
        let pusher_loop = tokio::spawn(async move {
            loop {
                match push_listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!("push connection from {peer}");
                        let publish_tx = publish_tx.clone();
                        let broadcast_tx = broadcast_tx.clone();
                        tokio::spawn(async move {
                            handle_pusher(stream, publish_tx, broadcast_tx).await;
                        });
                    }
                    Err(e) => warn!("push accept failed: {e}"),
                }
            }
        });

        let publish_tx = self.publish_tx;
        let subscribe_listener = self.subscribe_listener;
        let subscriber_loop = tokio::spawn(async move {
            loop {
                match subscribe_listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!("subscriber connected from {peer}");
                        let receiver = publish_tx.subscribe();
                        tokio::spawn(async move {
                            handle_subscriber(stream, receiver).await;
                        });
                    }
                    Err(e) => warn!("subscribe accept failed: {e}"),
                }
            }
        });

        let _ = tokio::join!(pusher_loop, subscriber_loop);
        Ok(())
    }
}

async fn handle_pusher(
    stream: TcpStream,
    publish_tx: broadcast::Sender<String>,
    broadcast_tx: mpsc::Sender<TransactionEnvelope>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                warn!("push connection read failed: {e}");
                return;
            }
        };
        match CoordinationMessage::from_json(&line) {
            Ok(CoordinationMessage::Broadcast { tx }) => {
                if broadcast_tx.send(tx).await.is_err() {
                    warn!("coordinator channel closed; dropping broadcast");
                }
            }
            Ok(message) => {
                debug!(
                    "re-publishing {} for tx {}",
                    message.command(),
                    message.tx_id()
                );
                let _ = publish_tx.send(line);
            }
            Err(e) => {
                // Unknown or malformed commands are rejected, not relayed.
                warn!("rejecting pushed message: {e}");
            }
        }
    }
}

async fn handle_subscriber(mut stream: TcpStream, mut receiver: broadcast::Receiver<String>) {
    loop {
        match receiver.recv().await {
            Ok(mut line) => {
                line.push('\n');
                if stream.write_all(line.as_bytes()).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("subscriber lagged; {skipped} messages dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
