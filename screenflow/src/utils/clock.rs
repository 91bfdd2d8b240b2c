//! Calendar clock used by the cache ledger.

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::fmt::Debug;

/// Supplies "today" to the cache ledger.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Reads the local system date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to a settable date.
#[derive(Debug)]
pub struct FixedClock {
    day: Mutex<NaiveDate>,
}

impl FixedClock {
    /// Creates a clock that always reports `day`.
    #[must_use]
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: Mutex::new(day),
        }
    }

    /// Moves the clock to another date.
    pub fn set(&self, day: NaiveDate) {
        *self.day.lock() = day;
    }

    /// Moves the clock forward by whole days.
    pub fn advance_days(&self, days: u64) {
        let mut day = self.day.lock();
        if let Some(next) = day.checked_add_days(chrono::Days::new(days)) {
            *day = next;
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.day.lock()
    }
}
