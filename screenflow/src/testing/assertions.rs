//! Test assertions for artifacts and stage reports.

use crate::core::{Artifact, StageReport, StageStatus};

/// Asserts that the artifact holds exactly `expected`, in order.
pub fn assert_symbols(artifact: &Artifact, expected: &[&str]) {
    let actual = artifact.symbols();
    assert_eq!(
        actual, expected,
        "Artifact '{}' holds {:?}, expected {:?}",
        artifact.stage, actual, expected
    );
}

/// Asserts that the report reached the expected status.
pub fn assert_stage_status(report: &StageReport, expected: StageStatus) {
    assert_eq!(
        report.status, expected,
        "Stage '{}': expected status {}, got {}",
        report.stage, expected, report.status
    );
}

/// Asserts the passed, filtered and failed counts of a report.
pub fn assert_stage_counts(report: &StageReport, passed: usize, filtered: usize, failed: usize) {
    assert_eq!(
        (report.passed, report.filtered, report.failed),
        (passed, filtered, failed),
        "Stage '{}': expected (passed, filtered, failed) = ({}, {}, {}), got {}",
        report.stage,
        passed,
        filtered,
        failed,
        report.summary_line()
    );
}
