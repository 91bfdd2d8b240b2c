//! Numeric threshold filter.

use super::RecordFilter;
use crate::core::Record;
use crate::errors::ItemFailure;

/// Keeps records whose numeric field lies within optional bounds.
///
/// A bypass rule lets a record through regardless of the bounds when
/// another field is at or above a value, as the revenue screen does for
/// stocks with a protected relative-strength rating.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBounds {
    field: String,
    min: Option<f64>,
    max: Option<f64>,
    bypass: Option<(String, f64)>,
}

impl FieldBounds {
    /// Creates an unbounded filter on `field`.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            min: None,
            max: None,
            bypass: None,
        }
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Passes any record whose `field` is at or above `at_least`.
    #[must_use]
    pub fn with_bypass(mut self, field: impl Into<String>, at_least: f64) -> Self {
        self.bypass = Some((field.into(), at_least));
        self
    }

    fn within(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl RecordFilter for FieldBounds {
    fn apply(&self, record: Record) -> Result<Option<Record>, ItemFailure> {
        if let Some((field, at_least)) = &self.bypass {
            if record.get_f64(field).is_some_and(|value| value >= *at_least) {
                return Ok(Some(record));
            }
        }

        let value = record.get_f64(&self.field).ok_or_else(|| {
            ItemFailure::MissingData(format!(
                "{}: field '{}' is missing or not numeric",
                record.symbol().unwrap_or("?"),
                self.field
            ))
        })?;

        Ok(self.within(value).then_some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(value: f64) -> Record {
        Record::for_symbol("ABC").with("Price", value)
    }

    #[test]
    fn test_inclusive_range() {
        let filter = FieldBounds::new("Price").with_min(0.20).with_max(4.00);
        assert!(filter.apply(price(0.20)).unwrap().is_some());
        assert!(filter.apply(price(4.00)).unwrap().is_some());
        assert!(filter.apply(price(0.19)).unwrap().is_none());
        assert!(filter.apply(price(4.01)).unwrap().is_none());
    }

    #[test]
    fn test_missing_field_is_failure() {
        let filter = FieldBounds::new("Market Cap").with_min(10_000_000.0);
        let err = filter.apply(Record::for_symbol("ABC")).unwrap_err();
        assert!(matches!(err, ItemFailure::MissingData(ref m) if m.contains("ABC")));
        assert!(filter
            .apply(Record::for_symbol("ABC").with("Market Cap", "n/a"))
            .is_err());
    }

    #[test]
    fn test_listing_strings_are_parsed() {
        let filter = FieldBounds::new("Market Cap").with_min(10_000_000.0);
        let record = Record::for_symbol("ABC").with("Market Cap", "12,500,000.00");
        assert!(filter.apply(record).unwrap().is_some());
    }

    #[test]
    fn test_bypass() {
        let filter = FieldBounds::new("Growth")
            .with_min(20.0)
            .with_bypass("RS", 90.0);

        let protected = Record::for_symbol("P").with("RS", 95).with("Growth", 1.0);
        let weak = Record::for_symbol("W").with("RS", 85).with("Growth", 1.0);
        let protected_without_growth = Record::for_symbol("Q").with("RS", 90);

        assert!(filter.apply(protected).unwrap().is_some());
        assert!(filter.apply(weak).unwrap().is_none());
        assert!(filter.apply(protected_without_growth).unwrap().is_some());
    }
}
