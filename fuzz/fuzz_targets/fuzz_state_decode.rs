#![no_main]

use folio::contracts::StorageError;
use folio::storage::{decode_state, encode_state};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes in the state slot must decode or report corruption,
    // never panic
    match decode_state("last_invoice_number", data) {
        Ok(number) => {
            assert!((1..=12).contains(&number.month()));
            let bytes = encode_state(&number).unwrap();
            assert_eq!(decode_state("last_invoice_number", &bytes).unwrap(), number);
        }
        Err(StorageError::CorruptState { .. }) => {}
        Err(e) => panic!("unexpected error: {}", e),
    }
});
