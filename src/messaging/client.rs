//! Client side of the coordination hub: push publishing and broadcast
//! subscription

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing::debug;

use crate::errors::{MessageError, WalletResult};
use crate::messaging::messages::CoordinationMessage;

/// Connects to the hub's push and publish endpoints
#[derive(Debug, Clone)]
pub struct MessageClient {
    push_addr: String,
    subscribe_addr: String,
}

impl MessageClient {
    pub fn new(push_addr: impl Into<String>, subscribe_addr: impl Into<String>) -> Self {
        Self {
            push_addr: push_addr.into(),
            subscribe_addr: subscribe_addr.into(),
        }
    }

    /// Push one message to the hub
    pub async fn publish(&self, message: &CoordinationMessage) -> WalletResult<()> {
        let mut stream = TcpStream::connect(&self.push_addr)
            .await
            .map_err(MessageError::from)?;
        let mut line = message.to_json()?;
        line.push('\n');
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(MessageError::from)?;
        stream.flush().await.map_err(MessageError::from)?;
        debug!("published {} for tx {}", message.command(), message.tx_id());
        Ok(())
    }

    /// Open a fan-out subscription to everything the hub publishes
    pub async fn subscribe(&self) -> WalletResult<Subscription> {
        let stream = TcpStream::connect(&self.subscribe_addr)
            .await
            .map_err(MessageError::from)?;
        let (read_half, _write_half) = stream.into_split();
        Ok(Subscription {
            lines: BufReader::new(read_half).lines(),
        })
    }
}

/// A live subscription yielding decoded coordination messages
pub struct Subscription {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl Subscription {
    /// Next message, or `None` once the hub hangs up
    ///
    /// Messages with unknown command tags surface as decode errors; the
    /// subscription stays usable afterwards.
    pub async fn next_message(&mut self) -> WalletResult<Option<CoordinationMessage>> {
        match self.lines.next_line().await.map_err(MessageError::from)? {
            Some(line) => Ok(Some(CoordinationMessage::from_json(&line)?)),
            None => Ok(None),
        }
    }
}
