//! Symbol character exclusion.

use super::RecordFilter;
use crate::core::Record;
use crate::errors::ItemFailure;

/// Drops records whose symbol contains any of the excluded characters.
///
/// The default excludes `/` and `^`, which mark share classes and indices
/// on exchange listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolExclusion {
    chars: Vec<char>,
}

impl Default for SymbolExclusion {
    fn default() -> Self {
        Self::new(['/', '^'])
    }
}

impl SymbolExclusion {
    /// Creates an exclusion over the given characters.
    #[must_use]
    pub fn new(chars: impl IntoIterator<Item = char>) -> Self {
        Self {
            chars: chars.into_iter().collect(),
        }
    }

    /// Returns true if `symbol` contains an excluded character.
    #[must_use]
    pub fn excludes(&self, symbol: &str) -> bool {
        symbol.chars().any(|c| self.chars.contains(&c))
    }
}

impl RecordFilter for SymbolExclusion {
    fn apply(&self, record: Record) -> Result<Option<Record>, ItemFailure> {
        let symbol = record
            .symbol()
            .ok_or_else(|| ItemFailure::MissingData("record has no symbol".to_string()))?;
        if self.excludes(symbol) {
            Ok(None)
        } else {
            Ok(Some(record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exclusion() {
        let exclusion = SymbolExclusion::default();
        assert!(exclusion.excludes("BRK/A"));
        assert!(exclusion.excludes("^GSPC"));
        assert!(!exclusion.excludes("AAPL"));

        assert!(exclusion.apply(Record::for_symbol("AAPL")).unwrap().is_some());
        assert!(exclusion.apply(Record::for_symbol("BF/B")).unwrap().is_none());
        assert!(exclusion.apply(Record::new()).is_err());
    }

    #[test]
    fn test_custom_characters() {
        let exclusion = SymbolExclusion::new(['.']);
        assert!(exclusion.excludes("BRK.B"));
        assert!(!exclusion.excludes("BRK/B"));
    }
}
