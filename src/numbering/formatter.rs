//! Rendering of sequence numbers into invoice number strings.

use crate::contracts::SequenceNumber;
use crate::numbering::NumberingConfig;

/// Replaced with the zero-padded counter.
pub const PLACEHOLDER_INVOICE_NUMBER: &str = "{invoice_number}";
/// Replaced with the counter's year.
pub const PLACEHOLDER_YEAR: &str = "{year}";
/// Replaced with the counter's month, unpadded.
pub const PLACEHOLDER_MONTH: &str = "{month}";

/// Widest accepted padding: the digits of `u64::MAX`.
pub const MAX_PADDING: usize = 20;

/// Formats `number` with an explicit padding and pattern.
///
/// A padding of 0 leaves the counter as is; wider counters are never
/// truncated. A pattern without `{invoice_number}` drops the counter
/// entirely, which is left to configuration to catch.
pub fn format_number(number: &SequenceNumber, padding: usize, pattern: &str) -> String {
    let digits = number.increment_number().to_string();
    let mut counter = "0".repeat(padding.saturating_sub(digits.len()));
    counter.push_str(&digits);

    pattern
        .replace(PLACEHOLDER_INVOICE_NUMBER, &counter)
        .replace(PLACEHOLDER_YEAR, &number.year().to_string())
        .replace(PLACEHOLDER_MONTH, &number.month().to_string())
}

/// Formatter carrying the configured default padding and pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumberFormatter {
    padding: usize,
    pattern: String,
}

impl Default for InvoiceNumberFormatter {
    fn default() -> Self {
        Self::from_config(&NumberingConfig::default())
    }
}

impl InvoiceNumberFormatter {
    pub fn new(padding: usize, pattern: impl Into<String>) -> Self {
        Self {
            padding,
            pattern: pattern.into(),
        }
    }

    pub fn from_config(config: &NumberingConfig) -> Self {
        Self::new(config.padding, config.pattern.clone())
    }

    /// Formats `number`, falling back to the configured padding and pattern
    /// for whichever override is `None`. Never mutates anything, so it is
    /// safe for previews.
    pub fn format(
        &self,
        number: &SequenceNumber,
        padding: Option<usize>,
        pattern: Option<&str>,
    ) -> String {
        format_number(
            number,
            padding.unwrap_or(self.padding),
            pattern.unwrap_or(&self.pattern),
        )
    }

    /// Formats with the configured defaults.
    #[inline]
    pub fn render(&self, number: &SequenceNumber) -> String {
        format_number(number, self.padding, &self.pattern)
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
