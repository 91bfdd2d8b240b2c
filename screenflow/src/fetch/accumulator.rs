//! The shared result accumulator of a fetch stage.

use crate::core::{Artifact, Record};
use crate::errors::ItemFailure;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// One item that produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    /// Index of the item in the stage input.
    pub index: usize,
    /// Identifier of the item (usually its symbol).
    pub id: String,
    /// What went wrong.
    pub failure: ItemFailure,
}

/// Successes and failures of the in-progress stage.
///
/// Lives behind a single mutex for the whole stage; each worker takes the
/// lock once per settled item. Every index is settled at most once.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    records: Vec<(usize, Record)>,
    failures: Vec<FetchFailure>,
    degraded: BTreeSet<usize>,
    settled: HashSet<usize>,
}

impl BatchAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a clean record for `index`.
    pub fn record_success(&mut self, index: usize, record: Record) {
        if self.settled.insert(index) {
            self.records.push((index, record));
        }
    }

    /// Records a flagged fallback record for `index`.
    pub fn record_degraded(&mut self, index: usize, record: Record) {
        if self.settled.insert(index) {
            self.degraded.insert(index);
            self.records.push((index, record));
        }
    }

    /// Records a failed item.
    pub fn record_failure(&mut self, index: usize, id: impl Into<String>, failure: ItemFailure) {
        if self.settled.insert(index) {
            self.failures.push(FetchFailure {
                index,
                id: id.into(),
                failure,
            });
        }
    }

    /// Returns true if `index` already has an outcome.
    #[must_use]
    pub fn is_settled(&self, index: usize) -> bool {
        self.settled.contains(&index)
    }

    /// Returns the number of items with an outcome.
    #[must_use]
    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }

    /// Returns the number of records kept so far.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Returns the number of failed items so far.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Builds the checkpoint artifact from the records kept so far.
    ///
    /// Records are ordered by input index, so identical runs write identical
    /// artifacts regardless of worker scheduling.
    #[must_use]
    pub fn checkpoint(&self, stage: &str) -> Artifact {
        let mut indexed: Vec<&(usize, Record)> = self.records.iter().collect();
        indexed.sort_by_key(|(index, _)| *index);
        Artifact::new(
            stage,
            indexed.into_iter().map(|(_, record)| record.clone()).collect(),
        )
    }

    /// Consumes the accumulator into records, failures and degraded indices,
    /// each ordered by input index.
    #[must_use]
    pub fn into_parts(mut self) -> (Vec<Record>, Vec<FetchFailure>, BTreeSet<usize>) {
        self.records.sort_by_key(|(index, _)| *index);
        self.failures.sort_by_key(|failure| failure.index);
        (
            self.records.into_iter().map(|(_, record)| record).collect(),
            self.failures,
            self.degraded,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_checkpoint_orders_by_index() {
        let mut acc = BatchAccumulator::new();
        acc.record_success(2, Record::for_symbol("C"));
        acc.record_success(0, Record::for_symbol("A"));
        acc.record_failure(1, "B", ItemFailure::Fetch("404".into()));

        let checkpoint = acc.checkpoint("accumulation");
        assert_eq!(checkpoint.symbols(), vec!["A", "C"]);
        assert_eq!(acc.settled_count(), 3);
        assert_eq!(acc.failure_count(), 1);
    }

    #[test]
    fn test_each_index_settles_once() {
        let mut acc = BatchAccumulator::new();
        acc.record_success(4, Record::for_symbol("A"));
        acc.record_failure(4, "A", ItemFailure::Fetch("late".into()));
        acc.record_degraded(4, Record::for_symbol("A"));

        assert_eq!(acc.record_count(), 1);
        assert_eq!(acc.failure_count(), 0);
        assert!(acc.is_settled(4));
    }

    #[test]
    fn test_into_parts() {
        let mut acc = BatchAccumulator::new();
        acc.record_failure(7, "H", ItemFailure::Timeout { after_ms: 10 });
        acc.record_degraded(5, Record::for_symbol("F"));
        acc.record_failure(3, "D", ItemFailure::Fetch("503".into()));
        acc.record_success(1, Record::for_symbol("B"));

        let (records, failures, degraded) = acc.into_parts();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol(), Some("B"));
        assert_eq!(failures.iter().map(|f| f.index).collect::<Vec<_>>(), vec![3, 7]);
        assert_eq!(degraded.into_iter().collect::<Vec<_>>(), vec![5]);
    }
}
