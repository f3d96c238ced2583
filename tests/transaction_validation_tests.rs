//! Coordinator validation scenarios against a real commitment store

use std::sync::Arc;

use k256::{ProjectivePoint, Scalar};
use tempfile::tempdir;
use tokio::sync::Mutex;

use confidential_wallet_libs::coordinator::Coordinator;
use confidential_wallet_libs::crypto::commitment::{commit, random_scalar};
use confidential_wallet_libs::crypto::schnorr;
use confidential_wallet_libs::data_structures::transaction::{
    Transaction, TransactionKernel, TransactionOutput,
};
use confidential_wallet_libs::data_structures::types::CompressedPoint;
use confidential_wallet_libs::errors::{ValidationError, WalletError};
use confidential_wallet_libs::ledger::RecordStore;
use confidential_wallet_libs::rangeproof::assign_output;

struct Harness {
    coordinator: Coordinator,
    store: Arc<Mutex<RecordStore>>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let store = Arc::new(Mutex::new(
            RecordStore::open(dir.path().join("ledger.dat")).unwrap(),
        ));
        Self {
            coordinator: Coordinator::new(Arc::clone(&store)),
            store,
            _dir: dir,
        }
    }

    /// Put a commitment for `value` straight into the store
    async fn mint(&self, value: u64) -> (u32, Scalar) {
        let blinding = random_scalar();
        let commitment = CompressedPoint::compress(&commit(value, &blinding)).unwrap();
        let index = self.store.lock().await.put(&commitment).unwrap();
        (index, blinding)
    }
}

/// One input of `value`, one output of the same value, fee 0
fn one_in_one_out(input: u32, input_blinding: &Scalar, value: u64) -> Transaction {
    let assignment = assign_output(value).unwrap();
    let excess_secret = assignment.blinding - input_blinding;
    Transaction {
        inputs: vec![input],
        outputs: vec![TransactionOutput {
            commitment: assignment.commitment,
            rangeproof: assignment.rangeproof,
        }],
        kernel: TransactionKernel {
            fee: 0,
            excess: CompressedPoint::compress(&(ProjectivePoint::GENERATOR * excess_secret))
                .unwrap(),
            signature: schnorr::sign(&excess_secret).unwrap(),
        },
    }
}

#[tokio::test]
async fn balanced_one_in_one_out_is_accepted() {
    let harness = Harness::new();
    let (input, blinding) = harness.mint(10).await;

    let tx = one_in_one_out(input, &blinding, 10);
    let excess = harness.coordinator.excess_of(&tx).await.unwrap();
    assert_eq!(excess, tx.kernel.excess.decompress().unwrap());

    let outcome = harness.coordinator.apply(&tx).await.unwrap();

    assert_eq!(outcome.removed, vec![input]);
    assert_eq!(outcome.added.len(), 1);
    let mut store = harness.store.lock().await;
    assert!(!store.exists(input).unwrap());
    assert!(store.exists(outcome.added[0].index).unwrap());
}

#[tokio::test]
async fn unbalanced_transaction_is_rejected() {
    let harness = Harness::new();
    let (input, blinding) = harness.mint(10).await;

    // Output claims 11 against an input of 10; the excess no longer lies
    // on G alone, so the recomputed excess cannot match the kernel.
    let tx = one_in_one_out(input, &blinding, 11);
    let result = harness.coordinator.apply(&tx).await;
    assert!(matches!(
        result,
        Err(WalletError::Validation(ValidationError::ExcessMismatch))
    ));
    assert!(harness.store.lock().await.exists(input).unwrap());
}

#[tokio::test]
async fn spent_input_cannot_be_spent_again() {
    let harness = Harness::new();
    let (input, blinding) = harness.mint(10).await;

    let tx = one_in_one_out(input, &blinding, 10);
    harness.coordinator.apply(&tx).await.unwrap();

    let again = one_in_one_out(input, &blinding, 10);
    let result = harness.coordinator.apply(&again).await;
    assert!(matches!(
        result,
        Err(WalletError::Validation(ValidationError::UnknownInput(i))) if i == input
    ));
}

#[tokio::test]
async fn duplicate_input_is_rejected() {
    let harness = Harness::new();
    let (input, blinding) = harness.mint(10).await;

    let mut tx = one_in_one_out(input, &blinding, 10);
    tx.inputs.push(input);
    let result = harness.coordinator.apply(&tx).await;
    assert!(matches!(
        result,
        Err(WalletError::Validation(ValidationError::DuplicateInput(i))) if i == input
    ));
    assert!(harness.store.lock().await.exists(input).unwrap());
}

#[tokio::test]
async fn unknown_input_is_rejected() {
    let harness = Harness::new();
    let (_, blinding) = harness.mint(10).await;

    let tx = one_in_one_out(7, &blinding, 10);
    let result = harness.coordinator.apply(&tx).await;
    assert!(matches!(
        result,
        Err(WalletError::Validation(ValidationError::UnknownInput(7)))
    ));
}

#[tokio::test]
async fn bad_kernel_signature_is_rejected() {
    let harness = Harness::new();
    let (input, blinding) = harness.mint(10).await;

    let mut tx = one_in_one_out(input, &blinding, 10);
    tx.kernel.signature = schnorr::sign(&random_scalar()).unwrap();
    let result = harness.coordinator.apply(&tx).await;
    assert!(matches!(
        result,
        Err(WalletError::Validation(
            ValidationError::InvalidKernelSignature
        ))
    ));
}

#[tokio::test]
async fn tampered_bit_commitment_invalidates_the_proof() {
    let harness = Harness::new();
    let (input, blinding) = harness.mint(10).await;

    let mut tx = one_in_one_out(input, &blinding, 10);
    // Swap a single bit commitment for an unrelated point; the proof must
    // fail even though every other ring is intact.
    let forged = CompressedPoint::compress(&commit(1 << 3, &random_scalar())).unwrap();
    tx.outputs[0].rangeproof.commitments[3] = forged;

    let result = harness.coordinator.apply(&tx).await;
    assert!(matches!(
        result,
        Err(WalletError::Validation(ValidationError::InvalidRangeProof(_)))
    ));
}
