pub mod clock;
pub mod error;
pub mod generator;
pub mod lock;
pub mod sequence;
pub mod storage;

pub use clock::Clock;
pub use error::{FolioError, GeneratorError, LockError, LockResultExt, StorageError};
pub use generator::{GeneratorDefinition, NumberGenerator};
pub use lock::LockBackend;
pub use sequence::{Period, SequenceNumber};
pub use storage::{
    InvoiceIndex, InvoiceRecord, StateStore, LAST_INVOICE_NUMBER_KEY, STATE_NAMESPACE,
};
