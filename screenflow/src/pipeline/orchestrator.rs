//! Per-stage execution: cache check, transform, persist, mark complete.

use super::{StageSpec, StageTransform};
use crate::core::{Artifact, Record, StageReport, StageStatus};
use crate::errors::ScreenflowError;
use crate::events::{names, EventSink};
use crate::fetch::BatchFetchEngine;
use crate::stages::RecordFilter;
use crate::store::{ArtifactStore, CacheLedger, LedgerEntry};
use crate::utils::duration_ms;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The outcome of one stage.
#[derive(Debug, Clone)]
pub struct StageRun {
    /// Counts and timing.
    pub report: StageReport,
    /// The stage's artifact, cached or freshly produced.
    pub artifact: Artifact,
}

/// Drives one stage through NotStarted → Skipped, or
/// NotStarted → Running → Completed.
///
/// An orchestrator runs its stage at most once.
pub struct StageOrchestrator<'a> {
    spec: &'a StageSpec,
    store: &'a dyn ArtifactStore,
    ledger: &'a CacheLedger,
    engine: &'a BatchFetchEngine,
    events: &'a dyn EventSink,
    status: StageStatus,
}

impl std::fmt::Debug for StageOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageOrchestrator")
            .field("stage", &self.spec.name)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<'a> StageOrchestrator<'a> {
    /// Creates an orchestrator for `spec`.
    #[must_use]
    pub fn new(
        spec: &'a StageSpec,
        store: &'a dyn ArtifactStore,
        ledger: &'a CacheLedger,
        engine: &'a BatchFetchEngine,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            spec,
            store,
            ledger,
            engine,
            events,
            status: StageStatus::NotStarted,
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        self.status
    }

    /// Runs the stage under `entry`.
    ///
    /// A stage the ledger lists as complete, whose artifact still exists
    /// and reads back, is skipped and its cached artifact returned
    /// unchanged. Otherwise the
    /// predecessor's artifact is read, the transform applied, the result
    /// persisted, and the stage marked complete in `entry`.
    ///
    /// # Errors
    ///
    /// Fails on a missing predecessor artifact, a failing source, or a
    /// store or ledger write error. Item failures never fail the stage.
    pub async fn run(&mut self, entry: &mut LedgerEntry) -> Result<StageRun, ScreenflowError> {
        let started = Instant::now();
        let stage = self.spec.name.as_str();

        if self.ledger.should_skip(entry, stage, self.store).await {
            match self.store.read(stage).await {
                Ok(artifact) => return self.skip(stage, artifact, started).await,
                Err(err) => {
                    warn!(stage = %stage, error = %err, "Cached artifact is unreadable, re-running stage");
                }
            }
        }

        self.transition(StageStatus::Running)?;
        info!(stage = %stage, kind = %self.spec.kind(), "Running stage");
        self.events
            .emit(
                names::STAGE_STARTED,
                Some(json!({ "stage": stage, "kind": self.spec.kind().to_string() })),
            )
            .await;

        let mut report = StageReport::new(stage, self.spec.kind());
        report.status = StageStatus::Running;

        let artifact = match &self.spec.transform {
            StageTransform::Source(source) => {
                let records = source.produce(stage).await.map_err(|err| match err {
                    ScreenflowError::Source { .. } => err,
                    other => ScreenflowError::source(stage, other.to_string()),
                })?;
                report.input_count = records.len();
                Artifact::new(stage, records)
            }
            StageTransform::Filter(filter) => {
                let input = self.read_input().await?;
                report.input_count = input.len();
                apply_filter(stage, filter.as_ref(), input.records, &mut report)
            }
            StageTransform::Fetch(runner) => {
                let input = self.read_input().await?;
                let fetched = runner
                    .run(self.engine, stage, input.records, self.store)
                    .await?;
                report.input_count = fetched.total;
                for failure in &fetched.failures {
                    report.record_failure(failure.id.clone());
                }
                report.degraded = fetched.degraded.len();
                report.not_attempted = fetched.not_attempted();
                report.deadline_exceeded = fetched.deadline_exceeded;
                fetched.artifact
            }
        };
        report.passed = artifact.len();

        self.store.write(&artifact).await?;
        self.ledger.mark_complete(entry, stage).await?;
        self.transition(StageStatus::Completed)?;
        report.status = StageStatus::Completed;
        report.duration_ms = duration_ms(started.elapsed());

        info!(
            stage = %stage,
            duration_ms = report.duration_ms,
            "{}",
            report.summary_line()
        );
        self.events
            .emit(
                names::STAGE_COMPLETED,
                Some(serde_json::to_value(&report)?),
            )
            .await;

        Ok(StageRun { report, artifact })
    }

    async fn skip(
        &mut self,
        stage: &str,
        artifact: Artifact,
        started: Instant,
    ) -> Result<StageRun, ScreenflowError> {
        self.transition(StageStatus::Skipped)?;
        let mut report = StageReport::skipped(stage, self.spec.kind(), artifact.len());
        report.duration_ms = duration_ms(started.elapsed());

        info!(stage = %stage, "{}", report.summary_line());
        self.events
            .emit(
                names::STAGE_SKIPPED,
                Some(json!({ "stage": stage, "records": artifact.len() })),
            )
            .await;
        Ok(StageRun { report, artifact })
    }

    async fn read_input(&self) -> Result<Artifact, ScreenflowError> {
        let stage = &self.spec.name;
        let predecessor = self.spec.input.as_deref().ok_or_else(|| {
            ScreenflowError::Internal(format!("stage '{stage}' has no input stage"))
        })?;
        self.store.read(predecessor).await.map_err(|err| {
            if err.is_not_found() {
                ScreenflowError::missing_predecessor(stage, predecessor)
            } else {
                err
            }
        })
    }

    fn transition(&mut self, next: StageStatus) -> Result<(), ScreenflowError> {
        if !self.status.can_transition_to(next) {
            return Err(ScreenflowError::Internal(format!(
                "stage '{}' cannot move from {} to {}",
                self.spec.name, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

fn apply_filter(
    stage: &str,
    filter: &dyn RecordFilter,
    input: Vec<Record>,
    report: &mut StageReport,
) -> Artifact {
    let mut kept = Vec::with_capacity(input.len());
    for (index, record) in input.into_iter().enumerate() {
        let id = record
            .symbol()
            .map_or_else(|| format!("#{index}"), ToString::to_string);
        match filter.apply(record) {
            Ok(Some(record)) => kept.push(record),
            Ok(None) => report.filtered += 1,
            Err(failure) => {
                debug!(stage = %stage, id = %id, failure = %failure, "Record failed filter");
                report.record_failure(id);
            }
        }
    }
    Artifact::new(stage, kept)
}
