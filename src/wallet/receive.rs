//! Receiver side of the two-party transaction exchange
//!
//! The receiver answers a `request_send` addressed to it with a fresh
//! public nonce, completes the kernel signature when the partially signed
//! `send` arrives, appends its own output, and hands the finalized
//! transaction to the coordinator with a `broadcast`. The session nonce is
//! consumed exactly once per transaction id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use k256::ProjectivePoint;

use tracing::{debug, info, warn};

use crate::crypto::schnorr::{challenge, partial_response, SchnorrSignature};
use crate::data_structures::transaction::{TransactionKernel, TransactionOutput};
use crate::data_structures::types::CompressedPoint;
use crate::data_structures::wallet_output::WalletOutput;
use crate::errors::{ValidationError, WalletResult};
use crate::messaging::messages::{
    AddedOutput, CommandKind, CoordinationMessage, SendRequest, TransactionEnvelope, TxRef,
};
use crate::messaging::MessageClient;
use crate::rangeproof::assign_output;
use crate::wallet::session::SessionStore;
use crate::wallet::storage::WalletStorage;

/// Rejections are silent, so a pending receiver output whose `final`
/// never arrives is swept after this long.
const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(120);

struct PendingReceive {
    commitment: CompressedPoint,
    created_at: Instant,
}

/// Handles inbound exchange messages addressed to one wallet
pub struct ReceiveHandler {
    name: String,
    sessions: SessionStore,
    pending: HashMap<u32, PendingReceive>,
    pending_ttl: Duration,
}

impl ReceiveHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_pending_ttl(name, DEFAULT_PENDING_TTL)
    }

    pub fn with_pending_ttl(name: impl Into<String>, pending_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            sessions: SessionStore::new(),
            pending: HashMap::new(),
            pending_ttl,
        }
    }

    /// Answer a `request_send` addressed to this wallet with a fresh
    /// public nonce; requests for other destinations yield `None`
    pub fn respond_to_request(
        &mut self,
        request: &SendRequest,
    ) -> WalletResult<Option<CoordinationMessage>> {
        if request.destination != self.name {
            debug!(
                "ignoring request_send for {} (we are {})",
                request.destination, self.name
            );
            return Ok(None);
        }
        let witness = self.sessions.begin(request.id)?;
        info!("opened receive session for tx {}", request.id);
        Ok(Some(CoordinationMessage::RequestSendReply {
            tx: TxRef { id: request.id },
            witness,
        }))
    }

    /// Complete a partially signed `send` addressed to this wallet
    ///
    /// Consumes the session nonce, appends the receiver's output for
    /// `amount`, aggregates the kernel signature and excess, and verifies
    /// the aggregate before anything is stored or broadcast. Sends for
    /// other destinations yield `None`.
    pub fn accept_send(
        &mut self,
        storage: &WalletStorage,
        envelope: &TransactionEnvelope,
        amount: u64,
        sender_witness: &CompressedPoint,
    ) -> WalletResult<Option<CoordinationMessage>> {
        if envelope.destination != self.name {
            return Ok(None);
        }
        self.purge_stale_pending(storage)?;
        let nonce = self.sessions.take(envelope.id)?;

        // The kernel witness must be exactly witness_S + witness_R, or the
        // challenge the sender signed against is not the one we complete.
        let combined = sender_witness.decompress()? + ProjectivePoint::GENERATOR * nonce;
        let kernel = &envelope.transaction.kernel;
        if kernel.signature.witness.decompress()? != combined {
            return Err(ValidationError::AggregateSignatureInvalid.into());
        }

        let assignment = assign_output(amount)?;
        let e = challenge(&combined);
        let response = kernel.signature.response + partial_response(&nonce, &e, &assignment.blinding);
        let excess = kernel.excess.decompress()? + ProjectivePoint::GENERATOR * assignment.blinding;

        let mut transaction = envelope.transaction.clone();
        transaction.outputs.push(TransactionOutput {
            commitment: assignment.commitment,
            rangeproof: assignment.rangeproof.clone(),
        });
        transaction.kernel = TransactionKernel {
            fee: kernel.fee,
            excess: CompressedPoint::compress(&excess)?,
            signature: SchnorrSignature {
                witness: kernel.signature.witness,
                response,
            },
        };
        if !transaction.kernel.verify()? {
            return Err(ValidationError::AggregateSignatureInvalid.into());
        }

        storage.insert(&WalletOutput::new(
            assignment.commitment,
            assignment.blinding,
            amount,
        ))?;
        self.pending.insert(
            envelope.id,
            PendingReceive {
                commitment: assignment.commitment,
                created_at: Instant::now(),
            },
        );
        info!(
            "receiving {amount} in tx {}: output {}",
            envelope.id, assignment.commitment
        );

        Ok(Some(CoordinationMessage::Broadcast {
            tx: TransactionEnvelope {
                id: envelope.id,
                destination: envelope.destination.clone(),
                transaction,
            },
        }))
    }

    /// Apply a `final` placement and settle any pending output for `tx_id`
    pub fn on_final(
        &mut self,
        storage: &WalletStorage,
        tx_id: u32,
        removed: &[u32],
        added: &[AddedOutput],
    ) -> WalletResult<()> {
        apply_final(storage, removed, added)?;
        self.pending.remove(&tx_id);
        self.purge_stale_pending(storage)
    }

    /// Delete unconfirmed outputs whose exchange never finalized
    ///
    /// There is no NACK, so this sweep is how a rejected receive is
    /// rolled back. Rows that got their index in the meantime are kept.
    fn purge_stale_pending(&mut self, storage: &WalletStorage) -> WalletResult<()> {
        let ttl = self.pending_ttl;
        let expired: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, p)| p.created_at.elapsed() >= ttl)
            .map(|(&id, _)| id)
            .collect();
        for tx_id in expired {
            if let Some(pending) = self.pending.remove(&tx_id) {
                if let Some(output) = storage.output_by_commitment(&pending.commitment)? {
                    if output.index.is_none() {
                        storage.remove_by_commitment(&pending.commitment)?;
                        warn!("dropping expired pending output for tx {tx_id}");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Apply a `final` placement to the wallet store
///
/// Spent indices are deleted and any pending output whose commitment the
/// coordinator placed gets its index recorded. Placements for outputs the
/// wallet does not own are skipped.
pub fn apply_final(
    storage: &WalletStorage,
    removed: &[u32],
    added: &[AddedOutput],
) -> WalletResult<()> {
    storage.remove_by_indices(removed)?;
    for placement in added {
        if let Some(output) = storage.output_by_commitment(&placement.point)? {
            if output.index.is_none() {
                storage.confirm(&placement.point, placement.index)?;
                info!("output {} confirmed at #{}", placement.point, placement.index);
            }
        }
    }
    Ok(())
}

/// Drain inbound messages, answering the receive side of the protocol
///
/// Runs until `inbound` closes. Failed exchanges are logged and dropped;
/// the next message is handled normally.
pub async fn run_receiver(
    mut handler: ReceiveHandler,
    storage: &WalletStorage,
    client: &MessageClient,
    inbound: &mut tokio::sync::mpsc::UnboundedReceiver<CoordinationMessage>,
) {
    while let Some(message) = inbound.recv().await {
        let tx_id = message.tx_id();
        let reply = match &message {
            CoordinationMessage::RequestSend { tx } => handler.respond_to_request(tx),
            CoordinationMessage::Send {
                tx,
                amount,
                witness,
            } => handler.accept_send(storage, tx, *amount, witness),
            CoordinationMessage::Final { removed, added, .. } => {
                if let Err(e) = handler.on_final(storage, tx_id, removed, added) {
                    warn!("failed to apply final for tx {tx_id}: {e}");
                }
                continue;
            }
            other => {
                debug!("ignoring {} for tx {tx_id}", other.command());
                continue;
            }
        };
        match reply {
            Ok(Some(outgoing)) => {
                let command: CommandKind = outgoing.command();
                if let Err(e) = client.publish(&outgoing).await {
                    warn!("failed to publish {command} for tx {tx_id}: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("dropping {} for tx {tx_id}: {e}", message.command()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::{commit, random_scalar};
    use crate::data_structures::transaction::Transaction;
    use crate::data_structures::types::CompressedPoint;
    use crate::errors::WalletError;
    use k256::Scalar;

    fn partially_signed_envelope(
        witness_r: &CompressedPoint,
        destination: &str,
    ) -> (TransactionEnvelope, CompressedPoint) {
        // Inputs live on the ledger side; for the handler only the kernel
        // arithmetic matters, so a synthetic excess secret stands in.
        let excess_secret = random_scalar();
        let nonce = random_scalar();
        let witness_s = ProjectivePoint::GENERATOR * nonce;
        let combined = witness_s + witness_r.decompress().unwrap();
        let e = challenge(&combined);
        let response = partial_response(&nonce, &e, &excess_secret);
        let envelope = TransactionEnvelope {
            id: 77,
            destination: destination.to_string(),
            transaction: Transaction {
                inputs: vec![],
                outputs: vec![],
                kernel: TransactionKernel {
                    fee: 0,
                    excess: CompressedPoint::compress(
                        &(ProjectivePoint::GENERATOR * excess_secret),
                    )
                    .unwrap(),
                    signature: SchnorrSignature {
                        witness: CompressedPoint::compress(&combined).unwrap(),
                        response,
                    },
                },
            },
        };
        (envelope, CompressedPoint::compress(&witness_s).unwrap())
    }

    #[test]
    fn ignores_requests_for_other_wallets() {
        let mut handler = ReceiveHandler::new("sally");
        let reply = handler
            .respond_to_request(&SendRequest {
                id: 1,
                destination: "harry".to_string(),
            })
            .unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn completes_a_partially_signed_send() {
        let storage = WalletStorage::open_in_memory().unwrap();
        let mut handler = ReceiveHandler::new("sally");
        let reply = handler
            .respond_to_request(&SendRequest {
                id: 77,
                destination: "sally".to_string(),
            })
            .unwrap()
            .unwrap();
        let witness_r = match reply {
            CoordinationMessage::RequestSendReply { witness, .. } => witness,
            other => panic!("unexpected reply {}", other.command()),
        };

        let (envelope, witness_s) = partially_signed_envelope(&witness_r, "sally");
        let broadcast = handler
            .accept_send(&storage, &envelope, 10, &witness_s)
            .unwrap()
            .unwrap();

        let finalized = match broadcast {
            CoordinationMessage::Broadcast { tx } => tx.transaction,
            other => panic!("unexpected reply {}", other.command()),
        };
        assert_eq!(finalized.outputs.len(), 1);
        assert!(finalized.kernel.verify().unwrap());

        // The receiver's output is stored unconfirmed with the value it
        // was told, and its commitment opens to that value.
        let pending = storage.all_outputs().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].value, 10);
        assert!(pending[0].index.is_none());
        assert_eq!(
            commit(10, &pending[0].blinding),
            pending[0].commitment.decompress().unwrap()
        );
    }

    #[test]
    fn tampered_sender_witness_is_rejected() {
        let storage = WalletStorage::open_in_memory().unwrap();
        let mut handler = ReceiveHandler::new("sally");
        let reply = handler
            .respond_to_request(&SendRequest {
                id: 77,
                destination: "sally".to_string(),
            })
            .unwrap()
            .unwrap();
        let witness_r = match reply {
            CoordinationMessage::RequestSendReply { witness, .. } => witness,
            other => panic!("unexpected reply {}", other.command()),
        };

        let (envelope, _witness_s) = partially_signed_envelope(&witness_r, "sally");
        let forged =
            CompressedPoint::compress(&(ProjectivePoint::GENERATOR * Scalar::from(99u64)))
                .unwrap();
        let result = handler.accept_send(&storage, &envelope, 10, &forged);
        assert!(matches!(
            result,
            Err(WalletError::Validation(
                ValidationError::AggregateSignatureInvalid
            ))
        ));
        assert!(storage.all_outputs().unwrap().is_empty());
    }

    #[test]
    fn send_without_a_session_is_rejected() {
        let storage = WalletStorage::open_in_memory().unwrap();
        let mut handler = ReceiveHandler::new("sally");
        let witness_r =
            CompressedPoint::compress(&(ProjectivePoint::GENERATOR * random_scalar())).unwrap();
        let (envelope, witness_s) = partially_signed_envelope(&witness_r, "sally");
        assert!(handler
            .accept_send(&storage, &envelope, 5, &witness_s)
            .is_err());
    }

    #[test]
    fn unfinalized_pending_output_expires() {
        let storage = WalletStorage::open_in_memory().unwrap();
        let mut handler = ReceiveHandler::with_pending_ttl("sally", Duration::from_millis(0));
        let reply = handler
            .respond_to_request(&SendRequest {
                id: 77,
                destination: "sally".to_string(),
            })
            .unwrap()
            .unwrap();
        let witness_r = match reply {
            CoordinationMessage::RequestSendReply { witness, .. } => witness,
            other => panic!("unexpected reply {}", other.command()),
        };
        let (envelope, witness_s) = partially_signed_envelope(&witness_r, "sally");
        handler
            .accept_send(&storage, &envelope, 10, &witness_s)
            .unwrap()
            .unwrap();
        assert_eq!(storage.all_outputs().unwrap().len(), 1);

        // No final ever arrives for tx 77; the next sweep rolls the
        // pending row back.
        std::thread::sleep(Duration::from_millis(5));
        handler.on_final(&storage, 99, &[], &[]).unwrap();
        assert!(storage.all_outputs().unwrap().is_empty());
    }

    #[test]
    fn finalized_output_survives_the_pending_sweep() {
        let storage = WalletStorage::open_in_memory().unwrap();
        let mut handler = ReceiveHandler::with_pending_ttl("sally", Duration::from_millis(0));
        let reply = handler
            .respond_to_request(&SendRequest {
                id: 77,
                destination: "sally".to_string(),
            })
            .unwrap()
            .unwrap();
        let witness_r = match reply {
            CoordinationMessage::RequestSendReply { witness, .. } => witness,
            other => panic!("unexpected reply {}", other.command()),
        };
        let (envelope, witness_s) = partially_signed_envelope(&witness_r, "sally");
        handler
            .accept_send(&storage, &envelope, 10, &witness_s)
            .unwrap()
            .unwrap();
        let commitment = storage.all_outputs().unwrap()[0].commitment;

        std::thread::sleep(Duration::from_millis(5));
        handler
            .on_final(
                &storage,
                77,
                &[],
                &[AddedOutput {
                    index: 4,
                    point: commitment,
                }],
            )
            .unwrap();
        // A later sweep leaves the confirmed row alone.
        handler.on_final(&storage, 99, &[], &[]).unwrap();
        assert_eq!(storage.balance().unwrap(), 10);
    }

    #[test]
    fn sends_for_other_wallets_are_ignored() {
        let storage = WalletStorage::open_in_memory().unwrap();
        let mut handler = ReceiveHandler::new("sally");
        let witness_r =
            CompressedPoint::compress(&(ProjectivePoint::GENERATOR * random_scalar())).unwrap();
        let (envelope, witness_s) = partially_signed_envelope(&witness_r, "harry");
        let reply = handler
            .accept_send(&storage, &envelope, 5, &witness_s)
            .unwrap();
        assert!(reply.is_none());
    }
}
