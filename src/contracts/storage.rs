use serde::{Deserialize, Serialize};

use crate::contracts::error::StorageError;
use crate::contracts::sequence::SequenceNumber;

/// Namespace every state key is scoped under.
pub const STATE_NAMESPACE: &str = "folio";

/// Key holding the last issued invoice counter.
pub const LAST_INVOICE_NUMBER_KEY: &str = "last_invoice_number";

/// Durable key-value slot for sequence state.
///
/// # Invariants
/// - `set` followed by `get` on the same key returns an equal value
/// - A present but undecodable record surfaces as `StorageError::CorruptState`,
///   never as `Ok(None)`, so callers decide how to recover
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<SequenceNumber>, StorageError>;

    fn set(&self, key: &str, number: &SequenceNumber) -> Result<(), StorageError>;
}

/// The set of invoice numbers already committed to invoice records.
///
/// The generation service only ever calls `contains`. The remaining methods
/// belong to the host side that confirms invoices.
pub trait InvoiceIndex: Send + Sync {
    /// Returns true if an invoice record already carries exactly this number.
    fn contains(&self, invoice_number: &str) -> Result<bool, StorageError>;

    /// Returns true if at least one invoice has been recorded.
    fn has_any(&self) -> Result<bool, StorageError>;

    /// Commits an invoice record. Fails with `DuplicateInvoiceNumber` if the
    /// number is taken.
    fn record(&self, record: &InvoiceRecord) -> Result<(), StorageError>;

    /// Looks up the record carrying `invoice_number`.
    fn find(&self, invoice_number: &str) -> Result<Option<InvoiceRecord>, StorageError>;
}

/// A confirmed invoice as far as numbering is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub invoice_number: String,
    pub order_id: Option<String>,
    pub confirmed_at_ms: i64,
}

impl InvoiceRecord {
    /// Creates a record stamped with a fresh id and the current time.
    pub fn new(invoice_number: impl Into<String>, order_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invoice_number: invoice_number.into(),
            order_id,
            confirmed_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}
