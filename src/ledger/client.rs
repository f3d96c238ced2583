//! Remote client for the commitment store

use tokio::net::TcpStream;

use crate::data_structures::types::{CompressedPoint, OutputIndex};
use crate::errors::{LedgerError, WalletResult};
use crate::ledger::protocol::{
    decode_get_reply, decode_u32_reply, read_frame, write_frame, StoreRequest,
};

/// Speaks the binary store protocol against a [`serve_ledger`] loop.
///
/// One request is in flight at a time.
///
/// [`serve_ledger`]: crate::ledger::server::serve_ledger
pub struct LedgerClient {
    stream: TcpStream,
}

impl LedgerClient {
    pub async fn connect(addr: &str) -> WalletResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(LedgerError::from)?;
        Ok(Self { stream })
    }

    async fn request(&mut self, request: StoreRequest) -> WalletResult<Vec<u8>> {
        write_frame(&mut self.stream, &request.encode())
            .await
            .map_err(LedgerError::from)?;
        Ok(read_frame(&mut self.stream).await.map_err(LedgerError::from)?)
    }

    /// Store a commitment; returns its assigned index
    pub async fn put(&mut self, point: &CompressedPoint) -> WalletResult<OutputIndex> {
        let reply = self.request(StoreRequest::Put(*point)).await?;
        Ok(decode_u32_reply(&reply)?)
    }

    /// Fetch a live commitment and its creation timestamp
    pub async fn get(&mut self, index: OutputIndex) -> WalletResult<(CompressedPoint, u32)> {
        let reply = self.request(StoreRequest::Get(index)).await?;
        Ok(decode_get_reply(&reply)?)
    }

    /// Tombstone a record
    pub async fn remove(&mut self, index: OutputIndex) -> WalletResult<()> {
        let reply = self.request(StoreRequest::Remove(index)).await?;
        if !reply.is_empty() {
            return Err(LedgerError::MalformedFrame("remove reply should be empty".to_string()).into());
        }
        Ok(())
    }

    /// Whether the slot holds a live record
    pub async fn exists(&mut self, index: OutputIndex) -> WalletResult<bool> {
        let reply = self.request(StoreRequest::Exists(index)).await?;
        Ok(decode_u32_reply(&reply)? != 0)
    }

    /// One past the highest allocated slot
    pub async fn count(&mut self) -> WalletResult<OutputIndex> {
        let reply = self.request(StoreRequest::Count).await?;
        Ok(decode_u32_reply(&reply)?)
    }
}
