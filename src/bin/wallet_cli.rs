//! Wallet command line
//!
//! Holds a wallet's outputs in SQLite and drives both ends of the
//! two-party exchange over the coordination hub. Maintenance verbs talk
//! to the ledger store directly.
//!
//! ```bash
//! # Mint a starting output worth 100 and record it in the wallet db
//! cargo run --bin wallet-cli -- mint 100
//!
//! # Show the confirmed balance
//! cargo run --bin wallet-cli -- balance
//!
//! # Send 10 to the wallet listening as "sally"
//! cargo run --bin wallet-cli -- send sally 10
//!
//! # Receive as "sally"
//! cargo run --bin wallet-cli -- --wallet-db sally.db listen sally
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use confidential_wallet_libs::crypto::commitment::{commit, random_scalar};
use confidential_wallet_libs::data_structures::types::CompressedPoint;
use confidential_wallet_libs::data_structures::wallet_output::WalletOutput;
use confidential_wallet_libs::errors::WalletResult;
use confidential_wallet_libs::hex_utils::{scalar_from_hex, scalar_to_hex};
use confidential_wallet_libs::ledger::LedgerClient;
use confidential_wallet_libs::messaging::dispatcher::MessageDispatcher;
use confidential_wallet_libs::messaging::MessageClient;
use confidential_wallet_libs::wallet::{
    run_receiver, send_transaction, ReceiveHandler, WalletStorage,
};

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(author, version, about = "Confidential transaction wallet")]
struct CliArgs {
    /// Wallet database file
    #[arg(long, default_value = "./wallet.db")]
    wallet_db: String,

    /// Address of the ledger store protocol
    #[arg(long, default_value = "127.0.0.1:8887")]
    store_addr: String,

    /// Hub push address
    #[arg(long, default_value = "127.0.0.1:8888")]
    push_addr: String,

    /// Hub subscription address
    #[arg(long, default_value = "127.0.0.1:8889")]
    subscribe_addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the confirmed balance and the wallet's outputs
    Balance,
    /// Create an output of the given value directly on the ledger
    Mint { value: u64 },
    /// List every live record on the ledger
    Read,
    /// Tombstone a ledger record and forget it locally
    Remove { index: u32 },
    /// Send an amount to a listening wallet
    Send { destination: String, amount: u64 },
    /// Answer sends addressed to the given name until interrupted
    Listen { name: String },
    /// Print the commitment for a value and an optional blinding scalar
    Calc {
        value: u64,
        #[arg(long)]
        blinding: Option<String>,
    },
}

#[tokio::main]
async fn main() -> WalletResult<()> {
    tracing_subscriber::fmt::init();
    let args = CliArgs::parse();
    let storage = WalletStorage::open(&args.wallet_db)?;
    let messages = MessageClient::new(&args.push_addr, &args.subscribe_addr);

    match args.command {
        Command::Balance => {
            for output in storage.all_outputs()? {
                let state = match output.index {
                    Some(index) => format!("#{index}"),
                    None => "pending".to_string(),
                };
                println!("{state}\t{}\t{}", output.value, output.commitment);
            }
            println!("balance: {}", storage.balance()?);
        }
        Command::Mint { value } => {
            let blinding = random_scalar();
            let commitment = CompressedPoint::compress(&commit(value, &blinding))?;
            let mut ledger = LedgerClient::connect(&args.store_addr).await?;
            let index = ledger.put(&commitment).await?;
            storage.insert(&WalletOutput::new(commitment, blinding, value))?;
            storage.confirm(&commitment, index)?;
            println!("minted {value} at #{index}: {commitment}");
        }
        Command::Read => {
            let mut ledger = LedgerClient::connect(&args.store_addr).await?;
            let count = ledger.count().await?;
            for index in 0..count {
                if ledger.exists(index).await? {
                    let (point, timestamp) = ledger.get(index).await?;
                    println!("#{index}\t{point}\t{timestamp}");
                }
            }
        }
        Command::Remove { index } => {
            let mut ledger = LedgerClient::connect(&args.store_addr).await?;
            ledger.remove(index).await?;
            storage.remove_by_indices(&[index])?;
            println!("removed #{index}");
        }
        Command::Send {
            destination,
            amount,
        } => {
            let subscription = messages.subscribe().await?;
            let (dispatcher, _fallback, _drain) = MessageDispatcher::spawn(subscription);
            let tx_id = send_transaction(
                &storage,
                &messages,
                &dispatcher,
                &destination,
                amount,
                EXCHANGE_TIMEOUT,
            )
            .await?;
            println!("sent {amount} to {destination} in transaction {tx_id}");
            println!("balance: {}", storage.balance()?);
        }
        Command::Listen { name } => {
            let subscription = messages.subscribe().await?;
            let (_dispatcher, mut inbound, _drain) = MessageDispatcher::spawn(subscription);
            info!("listening as {name}");
            run_receiver(ReceiveHandler::new(&name), &storage, &messages, &mut inbound).await;
        }
        Command::Calc { value, blinding } => {
            let blinding = match blinding {
                Some(hex) => scalar_from_hex(&hex)?,
                None => random_scalar(),
            };
            let commitment = CompressedPoint::compress(&commit(value, &blinding))?;
            println!("blinding: {}", scalar_to_hex(&blinding));
            println!("commitment: {commitment}");
        }
    }
    Ok(())
}
