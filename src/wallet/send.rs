//! Sender side of the two-party transaction exchange
//!
//! The sender selects inputs, builds an optional change output, opens the
//! exchange with `request_send`, and on receipt of the receiver's public
//! nonce produces the partially signed transaction. The kernel witness it
//! sends is the combined nonce `R_S + R_R`; the receiver completes the
//! signature against the same challenge.

use std::time::Duration;

use k256::{ProjectivePoint, Scalar};
use rand::random;
use tracing::{debug, info};

use crate::crypto::commitment::random_scalar;
use crate::crypto::schnorr::{challenge, partial_response, SchnorrSignature};
use crate::data_structures::transaction::{Transaction, TransactionKernel, TransactionOutput};
use crate::data_structures::types::{CompressedPoint, OutputIndex};
use crate::data_structures::wallet_output::WalletOutput;
use crate::errors::{MessageError, WalletError, WalletResult};
use crate::messaging::dispatcher::MessageDispatcher;
use crate::messaging::messages::{
    AddedOutput, CommandKind, CoordinationMessage, SendRequest, TransactionEnvelope,
};
use crate::messaging::MessageClient;
use crate::rangeproof::{assign_output, OutputAssignment};
use crate::wallet::storage::WalletStorage;

/// Sender-side state for one transaction exchange
pub struct SendSession {
    pub tx_id: u32,
    destination: String,
    amount: u64,
    inputs: Vec<WalletOutput>,
    change: Option<OutputAssignment>,
    excess_secret: Scalar,
}

impl SendSession {
    /// Validate the spend, select inputs and build the change output
    ///
    /// The change output is inserted unconfirmed into the wallet store;
    /// [`SendSession::abort`] cleans it up if the exchange dies. Returns
    /// the session and the opening `request_send` message.
    pub fn begin(
        storage: &WalletStorage,
        destination: &str,
        amount: u64,
    ) -> WalletResult<(Self, CoordinationMessage)> {
        if amount == 0 {
            return Err(WalletError::InvalidArgument("cannot send 0".to_string()));
        }
        if destination.is_empty() {
            return Err(WalletError::InvalidArgument(
                "missing destination".to_string(),
            ));
        }
        let balance = storage.balance()?;
        if amount > balance {
            return Err(WalletError::InsufficientFunds(format!(
                "balance {balance} is below the requested {amount}"
            )));
        }

        let selection = storage.select_outputs(amount)?;
        if selection.is_empty() {
            return Err(WalletError::InsufficientFunds(format!(
                "no output subset covers {amount}"
            )));
        }
        debug!(
            "selected {} inputs totalling {}",
            selection.outputs.len(),
            selection.total
        );

        let change_amount = selection.total - amount;
        let change = if change_amount > 0 {
            let assignment = assign_output(change_amount)?;
            storage.insert(&WalletOutput::new(
                assignment.commitment,
                assignment.blinding,
                change_amount,
            ))?;
            info!("change output of {change_amount} assigned");
            Some(assignment)
        } else {
            None
        };

        let mut excess_secret = change
            .as_ref()
            .map(|c| c.blinding)
            .unwrap_or(Scalar::ZERO);
        for input in &selection.outputs {
            excess_secret -= input.blinding;
        }

        let tx_id: u32 = random();
        let request = CoordinationMessage::RequestSend {
            tx: SendRequest {
                id: tx_id,
                destination: destination.to_string(),
            },
        };
        Ok((
            Self {
                tx_id,
                destination: destination.to_string(),
                amount,
                inputs: selection.outputs,
                change,
                excess_secret,
            },
            request,
        ))
    }

    /// Build the partially signed `send` message from the receiver's
    /// public nonce
    pub fn on_nonce_reply(&self, witness_r: &CompressedPoint) -> WalletResult<CoordinationMessage> {
        let nonce = random_scalar();
        let witness_s = ProjectivePoint::GENERATOR * nonce;
        // One definition of the combined nonce, used by every party:
        // R = witness_S + witness_R.
        let combined = witness_s + witness_r.decompress()?;
        let e = challenge(&combined);
        let response = partial_response(&nonce, &e, &self.excess_secret);

        let kernel = TransactionKernel {
            fee: 0,
            excess: CompressedPoint::compress(&(ProjectivePoint::GENERATOR * self.excess_secret))?,
            signature: SchnorrSignature {
                witness: CompressedPoint::compress(&combined)?,
                response,
            },
        };
        let outputs = self
            .change
            .iter()
            .map(|assignment| TransactionOutput {
                commitment: assignment.commitment,
                rangeproof: assignment.rangeproof.clone(),
            })
            .collect();
        let transaction = Transaction {
            inputs: self.inputs.iter().filter_map(|o| o.index).collect(),
            outputs,
            kernel,
        };

        Ok(CoordinationMessage::Send {
            tx: TransactionEnvelope {
                id: self.tx_id,
                destination: self.destination.clone(),
                transaction,
            },
            amount: self.amount,
            witness: CompressedPoint::compress(&witness_s)?,
        })
    }

    /// Apply the coordinator's `final` placement: drop spent rows and
    /// confirm the change output's index
    pub fn settle(
        &self,
        storage: &WalletStorage,
        removed: &[OutputIndex],
        added: &[AddedOutput],
    ) -> WalletResult<()> {
        storage.remove_by_indices(removed)?;
        if let Some(change) = &self.change {
            let placement = added
                .iter()
                .find(|a| a.point == change.commitment)
                .ok_or_else(|| {
                    MessageError::Decode(
                        "final message does not place the change output".to_string(),
                    )
                })?;
            storage.confirm(&change.commitment, placement.index)?;
            info!("change output confirmed at #{}", placement.index);
        }
        Ok(())
    }

    /// Remove the pending change row after a failed exchange
    pub fn abort(&self, storage: &WalletStorage) -> WalletResult<()> {
        if let Some(change) = &self.change {
            storage.remove_by_commitment(&change.commitment)?;
        }
        Ok(())
    }
}

/// Run the full sender flow against the hub
pub async fn send_transaction(
    storage: &WalletStorage,
    client: &MessageClient,
    dispatcher: &MessageDispatcher,
    destination: &str,
    amount: u64,
    timeout: Duration,
) -> WalletResult<u32> {
    let (session, request) = SendSession::begin(storage, destination, amount)?;
    info!("sending {amount} to {destination} (tx {})", session.tx_id);

    // Register each wait before publishing the message that provokes it,
    // or a fast reply races the registration and is lost to the fallback
    // channel.
    let reply_wait = dispatcher.register(session.tx_id, CommandKind::RequestSendReply);
    if let Err(e) = client.publish(&request).await {
        session.abort(storage)?;
        return Err(e);
    }

    let reply = match reply_wait.recv(timeout).await {
        Ok(reply) => reply,
        Err(e) => {
            session.abort(storage)?;
            return Err(e);
        }
    };
    let witness_r = match reply {
        CoordinationMessage::RequestSendReply { witness, .. } => witness,
        other => {
            session.abort(storage)?;
            return Err(MessageError::Decode(format!(
                "expected request_send_reply, got {}",
                other.command()
            ))
            .into());
        }
    };

    let send_message = session.on_nonce_reply(&witness_r)?;
    let final_wait = dispatcher.register(session.tx_id, CommandKind::Final);
    if let Err(e) = client.publish(&send_message).await {
        session.abort(storage)?;
        return Err(e);
    }

    // Rejection is silent; only a `final` message (or the timeout)
    // resolves the exchange.
    match final_wait.recv(timeout).await {
        Ok(CoordinationMessage::Final { removed, added, .. }) => {
            session.settle(storage, &removed, &added)?;
            Ok(session.tx_id)
        }
        Ok(other) => {
            session.abort(storage)?;
            Err(MessageError::Decode(format!("expected final, got {}", other.command())).into())
        }
        Err(e) => {
            session.abort(storage)?;
            Err(e)
        }
    }
}
