//! Coordinator daemon
//!
//! Runs the three server halves of the system in one process: the indexed
//! commitment store with its binary request/reply protocol, the JSON-lines
//! message hub, and the validating transaction coordinator that sits
//! between them.
//!
//! ```bash
//! cargo run --bin coordinatord -- --ledger-file ./ledger.dat
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use confidential_wallet_libs::coordinator::{run_coordinator, Coordinator};
use confidential_wallet_libs::errors::{WalletError, WalletResult};
use confidential_wallet_libs::ledger::{serve_ledger, RecordStore};
use confidential_wallet_libs::messaging::hub::MessageHub;

#[derive(Parser)]
#[command(author, version, about = "Commitment ledger and transaction coordinator")]
struct CliArgs {
    /// Path of the commitment store file
    #[arg(long, default_value = "./ledger.dat")]
    ledger_file: String,

    /// Listen address for the binary store protocol
    #[arg(long, default_value = "127.0.0.1:8887")]
    store_addr: String,

    /// Listen address for pushed coordination messages
    #[arg(long, default_value = "127.0.0.1:8888")]
    push_addr: String,

    /// Listen address for broadcast subscriptions
    #[arg(long, default_value = "127.0.0.1:8889")]
    subscribe_addr: String,
}

#[tokio::main]
async fn main() -> WalletResult<()> {
    tracing_subscriber::fmt::init();
    let args = CliArgs::parse();

    let store = RecordStore::open(&args.ledger_file)?;
    info!(
        "opened {} with {} records",
        args.ledger_file,
        store.count()
    );
    let store = Arc::new(Mutex::new(store));

    let store_listener = TcpListener::bind(&args.store_addr).await?;
    let push_listener = TcpListener::bind(&args.push_addr).await?;
    let subscribe_listener = TcpListener::bind(&args.subscribe_addr).await?;

    let (hub, broadcasts) = MessageHub::new(push_listener, subscribe_listener);
    let publisher = hub.publisher();
    let coordinator = Coordinator::new(Arc::clone(&store));

    // All three run forever; any of them ending is fatal.
    tokio::try_join!(serve_ledger(store_listener, store), hub.run(), async {
        run_coordinator(coordinator, broadcasts, publisher).await;
        Ok::<(), WalletError>(())
    })?;
    Ok(())
}
