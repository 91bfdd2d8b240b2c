//! Stage-by-stage funnel summary.

use crate::store::ArtifactStore;
use serde::Serialize;
use std::fmt::Write as _;
use tracing::warn;

/// One row of the funnel: how many records survived a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelRow {
    /// The stage name.
    pub stage: String,
    /// Records in the stage's artifact, or `None` if it could not be read.
    pub remaining: Option<usize>,
    /// `remaining` as a percentage of the first stage's count.
    pub percent_of_total: Option<f64>,
}

/// Reads each stage's artifact and counts its records.
///
/// Artifacts are read through the store only. A stage whose artifact is
/// missing or unreadable yields a row with no counts. Percentages are
/// relative to the first stage and absent when it has no records.
pub async fn funnel(store: &dyn ArtifactStore, stages: &[&str]) -> Vec<FunnelRow> {
    let mut rows = Vec::with_capacity(stages.len());
    let mut total: Option<usize> = None;

    for (position, stage) in stages.iter().enumerate() {
        let remaining = match store.read(stage).await {
            Ok(artifact) => Some(artifact.len()),
            Err(err) => {
                warn!(stage = %stage, error = %err, "No artifact for funnel row");
                None
            }
        };
        if position == 0 {
            total = remaining;
        }

        #[allow(clippy::cast_precision_loss)]
        let percent_of_total = match (remaining, total) {
            (Some(count), Some(total)) if total > 0 => Some(count as f64 * 100.0 / total as f64),
            _ => None,
        };

        rows.push(FunnelRow {
            stage: (*stage).to_string(),
            remaining,
            percent_of_total,
        });
    }

    rows
}

/// Renders funnel rows as a plain-text table.
pub fn render_funnel(rows: &[FunnelRow]) -> String {
    let width = rows
        .iter()
        .map(|row| row.stage.len())
        .chain(std::iter::once("Stage".len()))
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:>16}  {:>10}", "Stage", "Stocks Remaining", "% of Total");
    for row in rows {
        let remaining = row
            .remaining
            .map_or_else(|| "-".to_string(), |count| count.to_string());
        let percent = row
            .percent_of_total
            .map_or_else(|| "N/A".to_string(), |p| format!("{p:.2}%"));
        let _ = writeln!(out, "{:<width$}  {:>16}  {:>10}", row.stage, remaining, percent);
    }
    out
}
