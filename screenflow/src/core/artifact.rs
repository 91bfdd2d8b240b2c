//! Stage artifacts.

use super::Record;
use serde::{Deserialize, Serialize};

/// The persisted output table of one stage.
///
/// An artifact is always read and written as a whole. Record order carries
/// no meaning for downstream stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// The stage that produced the artifact.
    pub stage: String,
    /// The records, in stage output order.
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Artifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(stage: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            stage: stage.into(),
            records,
        }
    }

    /// Creates an artifact with no records.
    #[must_use]
    pub fn empty(stage: impl Into<String>) -> Self {
        Self::new(stage, Vec::new())
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the artifact holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Returns the symbols of all records that have one.
    #[must_use]
    pub fn symbols(&self) -> Vec<&str> {
        self.records.iter().filter_map(Record::symbol).collect()
    }

    /// Returns true if any record carries the symbol.
    #[must_use]
    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.records.iter().any(|r| r.symbol() == Some(symbol))
    }

    /// Returns the number of records flagged as degraded.
    #[must_use]
    pub fn degraded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_degraded()).count()
    }
}

impl<'a> IntoIterator for &'a Artifact {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_and_lookup() {
        let artifact = Artifact::new(
            "liquidity",
            vec![
                Record::for_symbol("X"),
                Record::new().with("note", "no symbol"),
                Record::for_symbol("Z"),
            ],
        );

        assert_eq!(artifact.len(), 3);
        assert_eq!(artifact.symbols(), vec!["X", "Z"]);
        assert!(artifact.contains_symbol("Z"));
        assert!(!artifact.contains_symbol("Y"));
    }

    #[test]
    fn test_degraded_count() {
        let mut flagged = Record::for_symbol("B");
        flagged.mark_missing("fetch failed: 503");
        let artifact = Artifact::new("accumulation", vec![Record::for_symbol("A"), flagged]);
        assert_eq!(artifact.degraded_count(), 1);
    }

    #[test]
    fn test_empty_artifact_serializes_records() {
        let json = serde_json::to_string(&Artifact::empty("trend")).unwrap();
        assert_eq!(json, r#"{"stage":"trend","records":[]}"#);
    }
}
