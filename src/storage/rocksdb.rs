use std::path::Path;
use std::sync::Mutex;

use rocksdb::{BlockBasedOptions, Direction, IteratorMode, Options, WriteOptions, DB};

use crate::contracts::{
    InvoiceIndex, InvoiceRecord, SequenceNumber, StateStore, StorageError, STATE_NAMESPACE,
};
use crate::storage::codec::{decode_record, decode_state, encode_record, encode_state};

/// Key prefix for sequence state
const STATE_PREFIX: &str = "state";
/// Key prefix for confirmed invoice records
const INVOICE_PREFIX: &str = "inv";

/// RocksDB-backed state store and invoice index.
pub struct RocksDbStorage {
    db: DB,
    /// Serializes check-then-put in `record`
    record_lock: Mutex<()>,
}

impl RocksDbStorage {
    /// Opens or creates a RocksDB storage at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // Small working set: one state slot plus one key per invoice
        opts.set_write_buffer_size(8 * 1024 * 1024);
        opts.set_max_background_jobs(2);

        // Point lookups dominate (uniqueness checks), so bloom filters pay off
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_wal_dir(path.join("wal"));

        let db = DB::open(&opts, path).map_err(|e| StorageError::RocksDb(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Opened invoice numbering store");

        Ok(Self {
            db,
            record_lock: Mutex::new(()),
        })
    }

    /// Creates a state key.
    fn state_key(key: &str) -> String {
        format!("{}:{}:{}", STATE_PREFIX, STATE_NAMESPACE, key)
    }

    /// Creates an invoice record key.
    fn invoice_key(invoice_number: &str) -> String {
        format!("{}:{}", INVOICE_PREFIX, invoice_number)
    }

    fn invoice_prefix_bytes() -> Vec<u8> {
        format!("{}:", INVOICE_PREFIX).into_bytes()
    }

    /// State and invoice writes are rare and must survive an OS crash, so
    /// every write syncs the WAL.
    fn write_options() -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        opts
    }

    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| StorageError::RocksDb(e.to_string()))
    }

    fn put_bytes(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put_opt(key.as_bytes(), value, &Self::write_options())
            .map_err(|e| StorageError::RocksDb(e.to_string()))
    }

    /// Stores raw bytes in a state slot, bypassing encoding. Used to import
    /// state written by other tools.
    pub fn put_raw_state(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.put_bytes(&Self::state_key(key), bytes)
    }

    /// Counts recorded invoices.
    pub fn invoice_count(&self) -> Result<usize, StorageError> {
        let prefix = Self::invoice_prefix_bytes();
        let mut count = 0;
        for item in self.db.prefix_iterator(&prefix) {
            let (key, _) = item.map_err(|e| StorageError::RocksDb(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

impl StateStore for RocksDbStorage {
    fn get(&self, key: &str) -> Result<Option<SequenceNumber>, StorageError> {
        match self.get_bytes(&Self::state_key(key))? {
            Some(bytes) => decode_state(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, number: &SequenceNumber) -> Result<(), StorageError> {
        let bytes = encode_state(number)?;
        self.put_bytes(&Self::state_key(key), &bytes)
    }
}

impl InvoiceIndex for RocksDbStorage {
    fn contains(&self, invoice_number: &str) -> Result<bool, StorageError> {
        let key = Self::invoice_key(invoice_number);
        // Bloom filter answers most misses without touching data blocks
        if !self.db.key_may_exist(key.as_bytes()) {
            return Ok(false);
        }
        self.db
            .get_pinned(key.as_bytes())
            .map(|value| value.is_some())
            .map_err(|e| StorageError::RocksDb(e.to_string()))
    }

    fn has_any(&self) -> Result<bool, StorageError> {
        let prefix = Self::invoice_prefix_bytes();
        let mut iter = self
            .db
            .iterator(IteratorMode::From(&prefix, Direction::Forward));
        match iter.next() {
            Some(item) => {
                let (key, _) = item.map_err(|e| StorageError::RocksDb(e.to_string()))?;
                Ok(key.starts_with(&prefix))
            }
            None => Ok(false),
        }
    }

    fn record(&self, record: &InvoiceRecord) -> Result<(), StorageError> {
        let bytes = encode_record(record)?;
        let key = Self::invoice_key(&record.invoice_number);

        let _guard = self
            .record_lock
            .lock()
            .map_err(|e| StorageError::Io(format!("record lock poisoned: {}", e)))?;
        if self.get_bytes(&key)?.is_some() {
            return Err(StorageError::DuplicateInvoiceNumber(
                record.invoice_number.clone(),
            ));
        }
        self.put_bytes(&key, &bytes)
    }

    fn find(&self, invoice_number: &str) -> Result<Option<InvoiceRecord>, StorageError> {
        self.get_bytes(&Self::invoice_key(invoice_number))?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (RocksDbStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        (storage, dir)
    }

    #[test]
    fn missing_state_is_none() {
        let (storage, _dir) = create_test_storage();
        assert_eq!(storage.get("last_invoice_number").unwrap(), None);
    }

    #[test]
    fn state_round_trips() {
        let (storage, _dir) = create_test_storage();
        let mut number = SequenceNumber::new(41, 2024, 9);
        number.set_value("INV-41");

        storage.set("last_invoice_number", &number).unwrap();
        assert_eq!(storage.get("last_invoice_number").unwrap(), Some(number));
    }

    #[test]
    fn state_is_overwritten_not_appended() {
        let (storage, _dir) = create_test_storage();
        storage.set("k", &SequenceNumber::new(1, 2024, 1)).unwrap();
        storage.set("k", &SequenceNumber::new(2, 2024, 1)).unwrap();
        assert_eq!(storage.get("k").unwrap().unwrap().increment_number(), 2);
    }

    #[test]
    fn raw_state_that_does_not_decode_is_corrupt() {
        let (storage, _dir) = create_test_storage();
        storage.put_raw_state("k", b"\x01\x02\x03").unwrap();
        let err = storage.get("k").unwrap_err();
        assert!(matches!(err, StorageError::CorruptState { ref key, .. } if key == "k"));
    }

    #[test]
    fn invoice_index_tracks_records() {
        let (storage, _dir) = create_test_storage();
        assert!(!storage.has_any().unwrap());
        assert!(!storage.contains("INV-1").unwrap());

        let record = InvoiceRecord::new("INV-1", Some("order-1".into()));
        storage.record(&record).unwrap();

        assert!(storage.has_any().unwrap());
        assert!(storage.contains("INV-1").unwrap());
        assert!(!storage.contains("INV-10").unwrap());
        assert_eq!(storage.find("INV-1").unwrap(), Some(record));
        assert_eq!(storage.invoice_count().unwrap(), 1);
    }

    #[test]
    fn state_keys_do_not_count_as_invoices() {
        let (storage, _dir) = create_test_storage();
        storage.set("k", &SequenceNumber::new(1, 2024, 1)).unwrap();
        assert!(!storage.has_any().unwrap());
    }

    #[test]
    fn duplicate_record_is_rejected() {
        let (storage, _dir) = create_test_storage();
        storage.record(&InvoiceRecord::new("INV-1", None)).unwrap();
        let err = storage.record(&InvoiceRecord::new("INV-1", None)).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateInvoiceNumber(_)));
        assert_eq!(storage.invoice_count().unwrap(), 1);
    }
}
