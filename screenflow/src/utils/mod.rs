//! Small shared utilities: the ledger clock and stage-name validation.

mod clock;
mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use validation::validate_stage_name;

/// Converts a duration to fractional milliseconds for reports.
#[must_use]
pub fn duration_ms(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
