use serde::{Deserialize, Serialize};

use crate::contracts::GeneratorError;
use crate::numbering::formatter::{MAX_PADDING, PLACEHOLDER_INVOICE_NUMBER};
use crate::numbering::Generator;

/// Invoice numbering settings.
///
/// Field names on the wire match the option names the host stores them
/// under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    /// Id of the active generator.
    #[serde(rename = "invoice_number_generator")]
    pub generator: String,
    /// Zero-pad width of the counter. 0 disables padding.
    #[serde(rename = "invoice_number_padding", default)]
    pub padding: usize,
    /// Template with `{invoice_number}`, `{year}` and `{month}` placeholders.
    #[serde(rename = "invoice_number_pattern")]
    pub pattern: String,
    /// One-time seed for the last issued counter, applied while no invoice
    /// exists yet.
    #[serde(rename = "invoice_number_start", default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            generator: Generator::Infinite.id().to_string(),
            padding: 0,
            pattern: PLACEHOLDER_INVOICE_NUMBER.to_string(),
            start: None,
        }
    }
}

impl NumberingConfig {
    /// Creates a NumberingConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FOLIO_NUMBER_GENERATOR`: generator id (default: infinite)
    /// - `FOLIO_NUMBER_PADDING`: zero-pad width (default: 0)
    /// - `FOLIO_NUMBER_PATTERN`: number pattern (default: {invoice_number})
    /// - `FOLIO_NUMBER_START`: initial last issued counter (default: unset)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            generator: std::env::var("FOLIO_NUMBER_GENERATOR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.generator),
            padding: std::env::var("FOLIO_NUMBER_PADDING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.padding),
            pattern: std::env::var("FOLIO_NUMBER_PATTERN")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(default.pattern),
            start: std::env::var("FOLIO_NUMBER_START")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Whether the pattern will actually show the counter.
    pub fn pattern_has_number(&self) -> bool {
        self.pattern.contains(PLACEHOLDER_INVOICE_NUMBER)
    }

    /// Rejects settings the generator cannot honour.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.padding > MAX_PADDING {
            return Err(GeneratorError::InvalidSetting {
                setting: "invoice_number_padding",
                reason: format!("must be at most {}, got {}", MAX_PADDING, self.padding),
            });
        }
        if self.start == Some(u64::MAX) {
            return Err(GeneratorError::InvalidSetting {
                setting: "invoice_number_start",
                reason: format!("must be below {}", u64::MAX),
            });
        }
        Ok(())
    }

    /// Logs settings that are accepted but almost certainly wrong.
    pub(crate) fn warn_if_suspicious(&self) {
        if !self.pattern_has_number() {
            tracing::warn!(
                pattern = %self.pattern,
                "Invoice number pattern has no {} placeholder; issued numbers will not contain the counter",
                PLACEHOLDER_INVOICE_NUMBER
            );
        }
    }
}
