use serde::{Deserialize, Serialize};

use crate::contracts::sequence::{Period, SequenceNumber};

/// Produces the next invoice counter from the last issued one.
///
/// Implementations are pure: they never touch storage and never keep the
/// borrowed `last` beyond the call. The returned counter is always one past
/// the base the implementation settled on, whether that base was carried over
/// or freshly reset.
pub trait NumberGenerator: Send + Sync {
    fn generate(&self, last: Option<&SequenceNumber>, period: Period) -> SequenceNumber;
}

/// Registry entry describing a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorDefinition {
    pub id: String,
    pub label: String,
    pub description: String,
}

impl GeneratorDefinition {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: description.into(),
        }
    }
}
