//! Per-stage run reports.

use super::{StageKind, StageStatus};
use serde::{Deserialize, Serialize};

/// Counts and timing for one stage of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// The stage name.
    pub stage: String,
    /// The transform kind.
    pub kind: StageKind,
    /// Final status of the stage.
    pub status: StageStatus,
    /// Number of input records (for sources, records produced).
    pub input_count: usize,
    /// Records in the stage's artifact, degraded ones included.
    pub passed: usize,
    /// Records a filter rejected.
    pub filtered: usize,
    /// Items that produced no record.
    pub failed: usize,
    /// Records kept with flagged missing data.
    pub degraded: usize,
    /// Items never attempted because the stage deadline elapsed.
    pub not_attempted: usize,
    /// Whether the stage ended early on its deadline.
    pub deadline_exceeded: bool,
    /// Identifiers of the failed items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_ids: Vec<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl StageReport {
    /// Creates an empty report for a stage that has not run.
    #[must_use]
    pub fn new(stage: impl Into<String>, kind: StageKind) -> Self {
        Self {
            stage: stage.into(),
            kind,
            status: StageStatus::NotStarted,
            input_count: 0,
            passed: 0,
            filtered: 0,
            failed: 0,
            degraded: 0,
            not_attempted: 0,
            deadline_exceeded: false,
            failed_ids: Vec::new(),
            duration_ms: 0.0,
        }
    }

    /// Creates a report for a stage whose cached artifact was reused.
    #[must_use]
    pub fn skipped(stage: impl Into<String>, kind: StageKind, cached_records: usize) -> Self {
        Self {
            status: StageStatus::Skipped,
            passed: cached_records,
            ..Self::new(stage, kind)
        }
    }

    /// Records one failed item.
    pub fn record_failure(&mut self, id: impl Into<String>) {
        self.failed += 1;
        self.failed_ids.push(id.into());
    }

    /// Returns true if the stage reused its cached artifact.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.status == StageStatus::Skipped
    }

    /// Renders the end-of-stage summary.
    #[must_use]
    pub fn summary_line(&self) -> String {
        if self.is_skipped() {
            return format!("{} symbols loaded from cache", self.passed);
        }
        let mut line = format!(
            "{} failed, {} filtered, {} passed",
            self.failed, self.filtered, self.passed
        );
        if self.degraded > 0 {
            line.push_str(&format!(" ({} with missing data)", self.degraded));
        }
        if self.deadline_exceeded {
            line.push_str(&format!(
                "; deadline reached, {} not attempted",
                self.not_attempted
            ));
        }
        line
    }
}
