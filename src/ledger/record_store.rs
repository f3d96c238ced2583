//! Fixed-size commitment record storage
//!
//! The ledger is a growable flat file of 37-byte records: a 33-byte
//! compressed point followed by a 4-byte little-endian creation timestamp.
//! Slot `i` lives at byte offset `i * RECORD_SIZE`, so addressed access is
//! O(1). Liveness rides on the SEC1 prefix byte: a live record starts with
//! `0x02` or `0x03`, a tombstone with `0x00`. Tombstoned indices are
//! reused by `put` before the file grows.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::data_structures::types::{CompressedPoint, OutputIndex, COMPRESSED_POINT_SIZE};
use crate::errors::LedgerError;

/// On-disk size of one record: compressed point plus creation timestamp
pub const RECORD_SIZE: usize = COMPRESSED_POINT_SIZE + 4;

const FREE_SENTINEL: u8 = 0x00;

fn is_live_prefix(prefix: u8) -> bool {
    prefix == 0x02 || prefix == 0x03
}

/// The commitment record store
///
/// One process owns the backing file; callers serialize access (the
/// serving loop handles one request at a time).
pub struct RecordStore {
    file: File,
    count: OutputIndex,
}

impl RecordStore {
    /// Open (or create) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        if len % RECORD_SIZE as u64 != 0 {
            return Err(LedgerError::MalformedFrame(format!(
                "store file length {len} is not a multiple of the record size"
            )));
        }
        Ok(Self {
            file,
            count: (len / RECORD_SIZE as u64) as OutputIndex,
        })
    }

    /// One past the highest allocated slot (tombstones included)
    pub fn count(&self) -> OutputIndex {
        self.count
    }

    /// Store a commitment, reusing the lowest free slot before growing
    pub fn put(&mut self, point: &CompressedPoint) -> Result<OutputIndex, LedgerError> {
        if !is_live_prefix(point.prefix()) {
            return Err(LedgerError::InvalidPointPrefix(point.prefix()));
        }
        let index = self.next_available_record()?;

        let mut record = [0u8; RECORD_SIZE];
        record[..COMPRESSED_POINT_SIZE].copy_from_slice(point.as_bytes());
        record[COMPRESSED_POINT_SIZE..].copy_from_slice(&unix_time().to_le_bytes());
        self.write_record(index, &record)?;

        if index == self.count {
            self.count += 1;
        }
        Ok(index)
    }

    /// Read a live record's point and creation timestamp
    pub fn get(&mut self, index: OutputIndex) -> Result<(CompressedPoint, u32), LedgerError> {
        let record = self.read_record(index)?;
        if !is_live_prefix(record[0]) {
            return Err(LedgerError::RecordNotLive(index));
        }
        let mut point = [0u8; COMPRESSED_POINT_SIZE];
        point.copy_from_slice(&record[..COMPRESSED_POINT_SIZE]);
        let mut time = [0u8; 4];
        time.copy_from_slice(&record[COMPRESSED_POINT_SIZE..]);
        Ok((CompressedPoint::from_bytes(point), u32::from_le_bytes(time)))
    }

    /// Tombstone a record
    ///
    /// Removing an already-removed record is a protocol error and fails.
    pub fn remove(&mut self, index: OutputIndex) -> Result<(), LedgerError> {
        let record = self.read_record(index)?;
        if record[0] == FREE_SENTINEL {
            return Err(LedgerError::DoubleRemove(index));
        }
        if !is_live_prefix(record[0]) {
            return Err(LedgerError::CorruptRecord(
                index,
                format!("unexpected prefix byte {:#04x}", record[0]),
            ));
        }
        self.file
            .seek(SeekFrom::Start(index as u64 * RECORD_SIZE as u64))?;
        self.file.write_all(&[FREE_SENTINEL])?;
        Ok(())
    }

    /// Whether the slot holds a live record
    ///
    /// Never-allocated indices report `false` rather than erroring, so
    /// callers can probe before `get`.
    pub fn exists(&mut self, index: OutputIndex) -> Result<bool, LedgerError> {
        if index >= self.count {
            return Ok(false);
        }
        let record = self.read_record(index)?;
        Ok(is_live_prefix(record[0]))
    }

    /// Lowest tombstoned index, or `count` if the file must grow
    ///
    /// Linear scan: allocation is O(n) but the store is bounded by live
    /// UTXO count, and index reuse keeps the file dense.
    fn next_available_record(&mut self) -> Result<OutputIndex, LedgerError> {
        for index in 0..self.count {
            if !self.exists(index)? {
                return Ok(index);
            }
        }
        Ok(self.count)
    }

    fn read_record(&mut self, index: OutputIndex) -> Result<[u8; RECORD_SIZE], LedgerError> {
        if index >= self.count {
            return Err(LedgerError::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        self.file
            .seek(SeekFrom::Start(index as u64 * RECORD_SIZE as u64))?;
        let mut record = [0u8; RECORD_SIZE];
        self.file.read_exact(&mut record)?;
        Ok(record)
    }

    fn write_record(&mut self, index: OutputIndex, record: &[u8; RECORD_SIZE]) -> Result<(), LedgerError> {
        self.file
            .seek(SeekFrom::Start(index as u64 * RECORD_SIZE as u64))?;
        self.file.write_all(record)?;
        Ok(())
    }
}

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::random_scalar;
    use k256::ProjectivePoint;
    use tempfile::tempdir;

    fn random_point() -> CompressedPoint {
        CompressedPoint::compress(&(ProjectivePoint::GENERATOR * random_scalar())).unwrap()
    }

    fn open_store(dir: &tempfile::TempDir) -> RecordStore {
        RecordStore::open(dir.path().join("outputs")).unwrap()
    }

    #[test]
    fn put_get_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        let point = random_point();
        let index = store.put(&point).unwrap();
        assert_eq!(index, 0);
        let (read, timestamp) = store.get(index).unwrap();
        assert_eq!(read, point);
        assert!(timestamp > 0);
        assert!(store.exists(index).unwrap());
    }

    #[test]
    fn removed_index_is_reused_before_growth() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        for _ in 0..3 {
            store.put(&random_point()).unwrap();
        }
        store.remove(1).unwrap();
        assert_eq!(store.count(), 3);
        assert!(!store.exists(1).unwrap());

        let index = store.put(&random_point()).unwrap();
        assert_eq!(index, 1);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn double_remove_is_an_error() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        store.put(&random_point()).unwrap();
        store.remove(0).unwrap();
        assert!(matches!(store.remove(0), Err(LedgerError::DoubleRemove(0))));
    }

    #[test]
    fn get_of_tombstone_fails() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        store.put(&random_point()).unwrap();
        store.remove(0).unwrap();
        assert!(matches!(store.get(0), Err(LedgerError::RecordNotLive(0))));
    }

    #[test]
    fn out_of_range_access() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);
        assert!(matches!(
            store.get(5),
            Err(LedgerError::IndexOutOfRange { index: 5, count: 0 })
        ));
        assert!(!store.exists(5).unwrap());
        assert!(store.remove(5).is_err());
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let point = random_point();
        {
            let mut store = open_store(&dir);
            store.put(&random_point()).unwrap();
            store.put(&point).unwrap();
            store.remove(0).unwrap();
        }
        let mut store = open_store(&dir);
        assert_eq!(store.count(), 2);
        assert!(!store.exists(0).unwrap());
        assert_eq!(store.get(1).unwrap().0, point);
    }
}
