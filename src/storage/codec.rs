//! Binary encoding shared by the storage backends.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::contracts::{InvoiceRecord, SequenceNumber, StorageError};

/// Fixed-width integers, trailing bytes rejected so a value written by
/// something else does not half-decode.
fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    options()
        .serialize(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::Error> {
    options().deserialize(bytes)
}

/// Encodes a sequence number for the state slot.
pub fn encode_state(number: &SequenceNumber) -> Result<Vec<u8>, StorageError> {
    encode(number)
}

/// Decodes a state slot. Anything that is not a well-formed sequence number
/// is reported as `CorruptState`.
pub fn decode_state(key: &str, bytes: &[u8]) -> Result<SequenceNumber, StorageError> {
    let corrupt = |reason: String| StorageError::CorruptState {
        key: key.to_string(),
        reason,
    };

    let number: SequenceNumber = decode(bytes).map_err(|e| corrupt(e.to_string()))?;
    if !(1..=12).contains(&number.month()) {
        return Err(corrupt(format!("month out of range: {}", number.month())));
    }
    Ok(number)
}

pub fn encode_record(record: &InvoiceRecord) -> Result<Vec<u8>, StorageError> {
    encode(record)
}

pub fn decode_record(bytes: &[u8]) -> Result<InvoiceRecord, StorageError> {
    decode(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}
