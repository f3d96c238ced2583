//! Per-transaction receive sessions
//!
//! The receiver's nonce for a transaction lives in an explicit session
//! keyed by transaction id, consumed exactly once, and expired after a
//! TTL rather than held in a process-wide mapping that outlives the
//! exchange.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use k256::{ProjectivePoint, Scalar};

use crate::crypto::commitment::random_scalar;
use crate::data_structures::types::CompressedPoint;
use crate::errors::{MessageError, WalletResult};

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(120);

struct ReceiveSession {
    nonce: Scalar,
    created_at: Instant,
}

/// Receiver-side nonce sessions, one per in-flight transaction id
pub struct SessionStore {
    sessions: HashMap<u32, ReceiveSession>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Start a session for `tx_id` with a fresh nonce, returning the
    /// public witness `salt_R * G`
    ///
    /// A repeated `request_send` for the same id replaces the session
    /// with a new nonce; the old one is discarded, never reused.
    pub fn begin(&mut self, tx_id: u32) -> WalletResult<CompressedPoint> {
        self.purge_expired();
        let nonce = random_scalar();
        let witness = CompressedPoint::compress(&(ProjectivePoint::GENERATOR * nonce))?;
        self.sessions.insert(
            tx_id,
            ReceiveSession {
                nonce,
                created_at: Instant::now(),
            },
        );
        Ok(witness)
    }

    /// Consume the session nonce for `tx_id`
    ///
    /// The nonce leaves the store here; a second take for the same id
    /// fails, which is what prevents nonce reuse across attempts.
    pub fn take(&mut self, tx_id: u32) -> WalletResult<Scalar> {
        self.purge_expired();
        self.sessions
            .remove(&tx_id)
            .map(|session| session.nonce)
            .ok_or_else(|| MessageError::UnknownSession(tx_id).into())
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.sessions
            .retain(|_, session| session.created_at.elapsed() < ttl);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
