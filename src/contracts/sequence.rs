use std::fmt;

use serde::{Deserialize, Serialize};

/// A calendar period a counter can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// A period-tagged invoice counter.
///
/// `year` and `month` name the period the counter belongs to, which is not
/// necessarily the current one until a generator reconciles them. The
/// rendered value is whatever the formatter last produced for this counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumber {
    increment: u64,
    year: i32,
    month: u32,
    value: Option<String>,
}

impl SequenceNumber {
    pub fn new(increment: u64, year: i32, month: u32) -> Self {
        Self {
            increment,
            year,
            month,
            value: None,
        }
    }

    /// A zero counter scoped to `period`.
    pub fn fresh(period: Period) -> Self {
        Self::new(0, period.year, period.month)
    }

    /// The same counter moved to `period`. The rendered value is dropped.
    pub fn carried_to(&self, period: Period) -> Self {
        Self::new(self.increment, period.year, period.month)
    }

    /// Advances the counter by one, saturating at `u64::MAX`.
    pub fn increment(&mut self) {
        self.increment = self.increment.saturating_add(1);
    }

    /// Advances the counter by one. Returns false, leaving the counter
    /// unchanged, once it sits at `u64::MAX`.
    pub fn try_increment(&mut self) -> bool {
        match self.increment.checked_add(1) {
            Some(next) => {
                self.increment = next;
                true
            }
            None => false,
        }
    }

    /// True once no further number can follow this one.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.increment == u64::MAX
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    #[inline]
    pub fn increment_number(&self) -> u64 {
        self.increment
    }

    #[inline]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[inline]
    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }
}
