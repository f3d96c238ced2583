//! Wallet-side state and the two ends of the transaction exchange

pub mod receive;
pub mod selector;
pub mod send;
pub mod session;
pub mod storage;

pub use receive::{apply_final, run_receiver, ReceiveHandler};
pub use selector::{select_outputs, OutputSelection};
pub use send::{send_transaction, SendSession};
pub use session::SessionStore;
pub use storage::WalletStorage;
