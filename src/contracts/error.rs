use std::sync::PoisonError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

/// Extension trait for converting `std::sync` poison errors to LockError.
pub trait LockResultExt<T> {
    /// Converts a poisoned lock into a LockError.
    fn map_lock_err(self) -> Result<T, LockError>;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    #[inline]
    fn map_lock_err(self) -> Result<T, LockError> {
        self.map_err(|e| LockError::Poisoned(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored record exists but does not decode to the expected shape.
    #[error("Corrupt state under key {key}: {reason}")]
    CorruptState { key: String, reason: String },

    #[error("Invoice number already recorded: {0}")]
    DuplicateInvoiceNumber(String),

    #[error("IO error: {0}")]
    Io(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("The invoice number generator {generator} must define the {property} property")]
    MissingProperty {
        generator: String,
        property: &'static str,
    },

    #[error("Invoice number generator already registered: {0}")]
    DuplicateId(String),

    #[error("Invoice number generator not found: {0}")]
    NotFound(String),

    /// The pattern renders the same string for every counter and that string
    /// is already taken.
    #[error("Invoice number pattern {pattern} has no {{invoice_number}} placeholder and {rendered} is already used")]
    PatternWithoutNumber { pattern: String, rendered: String },

    #[error("Invalid invoice numbering setting {setting}: {reason}")]
    InvalidSetting {
        setting: &'static str,
        reason: String,
    },

    /// The counter reached `u64::MAX` and cannot be continued.
    #[error("Invoice number generator {generator} has no numbers left in period {period}")]
    Exhausted { generator: String, period: String },
}

impl GeneratorError {
    /// True for errors caused by registration or settings, as opposed to
    /// lookups of an unknown id.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GeneratorError::MissingProperty { .. }
                | GeneratorError::DuplicateId(_)
                | GeneratorError::PatternWithoutNumber { .. }
                | GeneratorError::InvalidSetting { .. }
                | GeneratorError::Exhausted { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock backend unavailable: {0}")]
    Unavailable(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}
