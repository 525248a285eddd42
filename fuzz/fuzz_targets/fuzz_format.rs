#![no_main]

use folio::contracts::SequenceNumber;
use folio::numbering::format_number;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First bytes drive the counter and padding, the rest is the pattern
    if data.len() < 10 {
        return;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[..8]);
    let increment = u64::from_le_bytes(raw);
    let padding = usize::from(data[8] % 32);
    let month = u32::from(data[9] % 12) + 1;
    let pattern = String::from_utf8_lossy(&data[10..]);

    let number = SequenceNumber::new(increment, 2024, month);
    let formatted = format_number(&number, padding, &pattern);

    // Without placeholders the pattern comes back unchanged
    if !pattern.contains('{') {
        assert_eq!(formatted, pattern);
    }
});
