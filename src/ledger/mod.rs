//! The commitment record store and its remote access protocol

pub mod client;
pub mod protocol;
pub mod record_store;
pub mod server;

pub use client::LedgerClient;
pub use record_store::{RecordStore, RECORD_SIZE};
pub use server::serve_ledger;
