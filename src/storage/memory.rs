use dashmap::DashMap;

use crate::contracts::{InvoiceIndex, InvoiceRecord, SequenceNumber, StateStore, StorageError};
use crate::storage::codec::{decode_record, decode_state, encode_record, encode_state};

/// In-memory storage with the same encoding as the RocksDB backend.
///
/// State is kept encoded so a corrupt record behaves exactly as it would on
/// disk.
#[derive(Default)]
pub struct MemoryStorage {
    state: DashMap<String, Vec<u8>>,
    invoices: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw bytes in a state slot, bypassing encoding. Used to import
    /// state written by other tools.
    pub fn put_raw_state(&self, key: &str, bytes: &[u8]) {
        self.state.insert(key.to_string(), bytes.to_vec());
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.len()
    }
}

impl StateStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<SequenceNumber>, StorageError> {
        match self.state.get(key) {
            Some(bytes) => decode_state(key, bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, number: &SequenceNumber) -> Result<(), StorageError> {
        self.state.insert(key.to_string(), encode_state(number)?);
        Ok(())
    }
}

impl InvoiceIndex for MemoryStorage {
    fn contains(&self, invoice_number: &str) -> Result<bool, StorageError> {
        Ok(self.invoices.contains_key(invoice_number))
    }

    fn has_any(&self) -> Result<bool, StorageError> {
        Ok(!self.invoices.is_empty())
    }

    fn record(&self, record: &InvoiceRecord) -> Result<(), StorageError> {
        let bytes = encode_record(record)?;
        match self.invoices.entry(record.invoice_number.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(
                StorageError::DuplicateInvoiceNumber(record.invoice_number.clone()),
            ),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(bytes);
                Ok(())
            }
        }
    }

    fn find(&self, invoice_number: &str) -> Result<Option<InvoiceRecord>, StorageError> {
        self.invoices
            .get(invoice_number)
            .map(|bytes| decode_record(bytes.value()))
            .transpose()
    }
}
