//! Request/reply serving loop for the commitment store
//!
//! One request is in flight at a time, so store mutations are serialized
//! without any locking discipline beyond the shared handle. A malformed
//! request or a failed operation drops the offending connection instead of
//! aborting the process; the wire format has no error reply.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::WalletResult;
use crate::ledger::protocol::{read_frame, write_frame, StoreRequest};
use crate::ledger::record_store::RecordStore;

/// Serve store requests forever on the given listener
pub async fn serve_ledger(
    listener: TcpListener,
    store: Arc<Mutex<RecordStore>>,
) -> WalletResult<()> {
    info!("ledger serving on {}", listener.local_addr()?);
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("ledger connection from {peer}");
        // Connections are handled one at a time; the request/reply
        // transport is synchronous by design.
        if let Err(e) = handle_connection(stream, &store).await {
            warn!("ledger connection from {peer} ended: {e}");
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    store: &Arc<Mutex<RecordStore>>,
) -> WalletResult<()> {
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            // A clean disconnect between requests is the normal exit.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let request = StoreRequest::decode(&frame)?;
        let reply = execute(store, request).await?;
        write_frame(&mut stream, &reply).await?;
    }
}

async fn execute(store: &Arc<Mutex<RecordStore>>, request: StoreRequest) -> WalletResult<Vec<u8>> {
    let mut store = store.lock().await;
    match request {
        StoreRequest::Put(point) => {
            let index = store.put(&point)?;
            info!("put({point}) -> {index}");
            Ok(index.to_le_bytes().to_vec())
        }
        StoreRequest::Get(index) => {
            let (point, timestamp) = store.get(index)?;
            info!("get({index}) -> {point}");
            let mut reply = point.as_bytes().to_vec();
            reply.extend_from_slice(&timestamp.to_le_bytes());
            Ok(reply)
        }
        StoreRequest::Remove(index) => {
            store.remove(index)?;
            info!("remove({index})");
            Ok(Vec::new())
        }
        StoreRequest::Exists(index) => {
            let exists = store.exists(index)?;
            info!("exists({index}) -> {exists}");
            Ok(u32::from(exists).to_le_bytes().to_vec())
        }
        StoreRequest::Count => {
            let count = store.count();
            info!("count() -> {count}");
            Ok(count.to_le_bytes().to_vec())
        }
    }
}
