use std::sync::{PoisonError, RwLock};

use chrono::Datelike;

use crate::contracts::{Clock, Period};

/// Reads the period from the local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_period(&self) -> Period {
        let now = chrono::Local::now();
        Period::new(now.year(), now.month())
    }
}

/// A clock stuck at a settable period.
#[derive(Debug)]
pub struct FixedClock {
    period: RwLock<Period>,
}

impl FixedClock {
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            period: RwLock::new(Period::new(year, month)),
        }
    }

    pub fn set(&self, year: i32, month: u32) {
        *self.period.write().unwrap_or_else(PoisonError::into_inner) = Period::new(year, month);
    }
}

impl Clock for FixedClock {
    fn current_period(&self) -> Period {
        *self.period.read().unwrap_or_else(PoisonError::into_inner)
    }
}
