//! Stage status and kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of transform a stage applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Produces the initial records; has no predecessor.
    Source,
    /// Keeps or drops each input record, single-threaded.
    Filter,
    /// Enriches each input record through the batch fetch engine.
    Fetch,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Filter => write!(f, "filter"),
            Self::Fetch => write!(f, "fetch"),
        }
    }
}

/// The execution status of a stage within one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The orchestrator has not looked at the stage yet.
    #[default]
    NotStarted,
    /// The cached artifact was reused.
    Skipped,
    /// The transform is executing.
    Running,
    /// The artifact was persisted and the ledger updated.
    Completed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Skipped => write!(f, "skipped"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status is final for the run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Completed)
    }

    /// Returns true if moving to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Skipped | Self::Running) | (Self::Running, Self::Completed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Source.to_string(), "source");
        assert_eq!(StageKind::Filter.to_string(), "filter");
        assert_eq!(StageKind::Fetch.to_string(), "fetch");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Skipped.is_terminal());
        assert!(StageStatus::Completed.is_terminal());
        assert!(!StageStatus::NotStarted.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_transitions() {
        use StageStatus::*;
        assert!(NotStarted.can_transition_to(Skipped));
        assert!(NotStarted.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Skipped.can_transition_to(Running));
        assert!(!NotStarted.can_transition_to(Completed));
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::NotStarted).unwrap();
        assert_eq!(json, r#""not_started""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::NotStarted);
    }
}
