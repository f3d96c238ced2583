//! The validating transaction coordinator
//!
//! Receives finalized transactions from the hub, checks conservation of
//! value, the kernel signature and every rangeproof against the live
//! commitment store, and only then mutates the store: spent inputs are
//! tombstoned and each new output gets a fresh index. Accepted
//! transactions are announced with a `final` broadcast; rejected ones are
//! logged and dropped, because the protocol has no NACK channel.

use std::collections::HashSet;
use std::sync::Arc;

use k256::ProjectivePoint;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::data_structures::transaction::Transaction;
use crate::data_structures::types::OutputIndex;
use crate::errors::{ValidationError, WalletResult};
use crate::ledger::record_store::RecordStore;
use crate::messaging::hub::HubPublisher;
use crate::messaging::messages::{AddedOutput, CoordinationMessage, TransactionEnvelope, TxRef};
use crate::rangeproof::verify_rangeproof;

/// Store mutations produced by an accepted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub removed: Vec<OutputIndex>,
    pub added: Vec<AddedOutput>,
}

/// Validates transactions and applies them to the commitment store
pub struct Coordinator {
    store: Arc<Mutex<RecordStore>>,
}

impl Coordinator {
    pub fn new(store: Arc<Mutex<RecordStore>>) -> Self {
        Self { store }
    }

    /// Validate `tx` and, if every check passes, atomically apply it
    pub async fn apply(&self, tx: &Transaction) -> WalletResult<TransactionOutcome> {
        let mut store = self.store.lock().await;

        // Conservation of value: excess' = Σ(outputs) − Σ(inputs), read
        // against the live store.
        let mut seen = HashSet::new();
        let mut excess = tx.output_sum()?;
        for &input in &tx.inputs {
            if !seen.insert(input) {
                return Err(ValidationError::DuplicateInput(input).into());
            }
            if input >= store.count() || !store.exists(input)? {
                return Err(ValidationError::UnknownInput(input).into());
            }
            let (point, _) = store.get(input)?;
            excess -= point.decompress()?;
        }
        if excess != tx.kernel.excess.decompress()? {
            return Err(ValidationError::ExcessMismatch.into());
        }

        // The transaction is final here, so the kernel signature verifies
        // against the excess alone.
        if !tx.kernel.verify()? {
            return Err(ValidationError::InvalidKernelSignature.into());
        }

        for output in &tx.outputs {
            verify_rangeproof(&output.commitment, &output.rangeproof)?;
        }

        // All checks passed; mutations below cannot fail on a live,
        // duplicate-free input set, so the application is atomic.
        let mut removed = Vec::with_capacity(tx.inputs.len());
        for &input in &tx.inputs {
            store.remove(input)?;
            info!("removed #{input}");
            removed.push(input);
        }
        let mut added = Vec::with_capacity(tx.outputs.len());
        for output in &tx.outputs {
            let index = store.put(&output.commitment)?;
            info!("allocated #{index}: {}", output.commitment);
            added.push(AddedOutput {
                index,
                point: output.commitment,
            });
        }

        Ok(TransactionOutcome { removed, added })
    }

    /// Check conservation without applying; used by tests and tooling
    pub async fn excess_of(&self, tx: &Transaction) -> WalletResult<ProjectivePoint> {
        let mut store = self.store.lock().await;
        let mut excess = tx.output_sum()?;
        for &input in &tx.inputs {
            let (point, _) = store.get(input)?;
            excess -= point.decompress()?;
        }
        Ok(excess)
    }
}

/// Drain finalized transactions from the hub, applying each and
/// publishing the `final` placement of those accepted
pub async fn run_coordinator(
    coordinator: Coordinator,
    mut broadcasts: mpsc::Receiver<TransactionEnvelope>,
    publisher: HubPublisher,
) {
    while let Some(envelope) = broadcasts.recv().await {
        let tx_id = envelope.id;
        match coordinator.apply(&envelope.transaction).await {
            Ok(outcome) => {
                info!("accepted transaction {tx_id}");
                let message = CoordinationMessage::Final {
                    tx: TxRef { id: tx_id },
                    removed: outcome.removed,
                    added: outcome.added,
                };
                if let Err(e) = publisher.publish(&message) {
                    warn!("failed to publish final for {tx_id}: {e}");
                }
            }
            // No NACK channel: the sender detects rejection by timeout.
            Err(e) => warn!("rejecting transaction {tx_id}: {e}"),
        }
    }
}
