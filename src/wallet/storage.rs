//! SQLite persistence for wallet-owned outputs
//!
//! One row per owned output: nullable unique ledger index, unique hex
//! commitment, hex blinding scalar, integer value. Rows are inserted
//! unconfirmed, get their index once the coordinator's `final` broadcast
//! names their commitment, and are deleted when spent.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use zeroize::Zeroizing;

use crate::data_structures::types::{CompressedPoint, OutputIndex};
use crate::data_structures::wallet_output::WalletOutput;
use crate::errors::{WalletError, WalletResult};
use crate::hex_utils::{scalar_from_hex, scalar_to_hex, HexEncodable};
use crate::wallet::selector::{select_outputs, OutputSelection};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS wallet_outputs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        idx INTEGER UNIQUE,
        commitment TEXT UNIQUE NOT NULL,
        blinding TEXT NOT NULL,
        value INTEGER NOT NULL
    );
"#;

/// SQLite-backed store of the wallet's outputs
pub struct WalletStorage {
    connection: Connection,
}

impl WalletStorage {
    /// Open (or create) the wallet database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> WalletResult<Self> {
        let connection = Connection::open(path)
            .map_err(|e| WalletError::StorageError(format!("failed to open wallet db: {e}")))?;
        Self::with_connection(connection)
    }

    /// In-memory wallet database, useful for tests
    pub fn open_in_memory() -> WalletResult<Self> {
        let connection = Connection::open_in_memory()
            .map_err(|e| WalletError::StorageError(format!("failed to open wallet db: {e}")))?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> WalletResult<Self> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self { connection })
    }

    /// Insert a new output row; `index` may be `None` for an unconfirmed
    /// output
    pub fn insert(&self, output: &WalletOutput) -> WalletResult<()> {
        self.connection.execute(
            "INSERT INTO wallet_outputs (idx, commitment, blinding, value) VALUES (?1, ?2, ?3, ?4)",
            params![
                output.index,
                output.commitment.to_hex(),
                scalar_to_hex(&output.blinding),
                output.value as i64,
            ],
        )?;
        Ok(())
    }

    /// Record the ledger index of a previously unconfirmed output
    pub fn confirm(&self, commitment: &CompressedPoint, index: OutputIndex) -> WalletResult<()> {
        let updated = self.connection.execute(
            "UPDATE wallet_outputs SET idx = ?1 WHERE commitment = ?2",
            params![index, commitment.to_hex()],
        )?;
        if updated == 0 {
            return Err(WalletError::StorageError(format!(
                "no wallet output with commitment {commitment}"
            )));
        }
        Ok(())
    }

    /// Delete spent outputs by ledger index
    pub fn remove_by_indices(&self, indices: &[OutputIndex]) -> WalletResult<()> {
        for &index in indices {
            self.connection
                .execute("DELETE FROM wallet_outputs WHERE idx = ?1", params![index])?;
        }
        Ok(())
    }

    /// Delete an output row by commitment (used to clean up a pending
    /// change output after a failed exchange)
    pub fn remove_by_commitment(&self, commitment: &CompressedPoint) -> WalletResult<()> {
        self.connection.execute(
            "DELETE FROM wallet_outputs WHERE commitment = ?1",
            params![commitment.to_hex()],
        )?;
        Ok(())
    }

    /// Sum of all confirmed output values
    pub fn balance(&self) -> WalletResult<u64> {
        let total: i64 = self.connection.query_row(
            "SELECT COALESCE(SUM(value), 0) FROM wallet_outputs WHERE idx IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    /// All confirmed outputs in storage (insertion) order
    pub fn confirmed_outputs(&self) -> WalletResult<Vec<WalletOutput>> {
        self.query_outputs(
            "SELECT idx, commitment, blinding, value FROM wallet_outputs
             WHERE idx IS NOT NULL ORDER BY id",
        )
    }

    /// Every output row, confirmed or not, in storage order
    pub fn all_outputs(&self) -> WalletResult<Vec<WalletOutput>> {
        self.query_outputs("SELECT idx, commitment, blinding, value FROM wallet_outputs ORDER BY id")
    }

    /// Look up a single output by commitment
    pub fn output_by_commitment(
        &self,
        commitment: &CompressedPoint,
    ) -> WalletResult<Option<WalletOutput>> {
        let result = self
            .connection
            .query_row(
                "SELECT idx, commitment, blinding, value FROM wallet_outputs WHERE commitment = ?1",
                params![commitment.to_hex()],
                row_to_output,
            )
            .optional()?;
        match result {
            Some(output) => Ok(Some(output?)),
            None => Ok(None),
        }
    }

    /// Greedy first-fit selection over confirmed outputs covering `target`
    pub fn select_outputs(&self, target: u64) -> WalletResult<OutputSelection> {
        Ok(select_outputs(&self.confirmed_outputs()?, target))
    }

    fn query_outputs(&self, sql: &str) -> WalletResult<Vec<WalletOutput>> {
        let mut statement = self.connection.prepare(sql)?;
        let rows = statement.query_map([], row_to_output)?;
        let mut outputs = Vec::new();
        for row in rows {
            outputs.push(row??);
        }
        Ok(outputs)
    }
}

fn row_to_output(row: &rusqlite::Row<'_>) -> rusqlite::Result<WalletResult<WalletOutput>> {
    let index: Option<OutputIndex> = row.get(0)?;
    let commitment_hex: String = row.get(1)?;
    let blinding_hex: Zeroizing<String> = Zeroizing::new(row.get(2)?);
    let value: i64 = row.get(3)?;
    Ok((|| {
        Ok(WalletOutput {
            index,
            commitment: CompressedPoint::from_hex(&commitment_hex)?,
            blinding: scalar_from_hex(&blinding_hex)?,
            value: value as u64,
        })
    })())
}
