use crate::contracts::sequence::Period;

/// Source of the current calendar period.
pub trait Clock: Send + Sync {
    fn current_period(&self) -> Period;
}
