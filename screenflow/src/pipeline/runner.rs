//! Sequential, cache-aware pipeline execution.

use super::{StageOrchestrator, StageSpec};
use crate::core::{Artifact, StageReport};
use crate::errors::ScreenflowError;
use crate::events::{names, EventSink};
use crate::fetch::BatchFetchEngine;
use crate::observability::{pipeline_span, stage_span};
use crate::settings::{Fingerprint, SettingsSnapshot};
use crate::store::{ArtifactStore, CacheLedger};
use crate::utils::duration_ms;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, Instrument};
use uuid::Uuid;

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// Fingerprint of the settings the run used.
    pub fingerprint: Fingerprint,
    /// One report per stage, in execution order.
    pub reports: Vec<StageReport>,
    /// The last stage's artifact.
    pub final_artifact: Artifact,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl PipelineResult {
    /// Returns the report for `stage`.
    #[must_use]
    pub fn report(&self, stage: &str) -> Option<&StageReport> {
        self.reports.iter().find(|report| report.stage == stage)
    }

    /// Returns the names of stages that reused their cached artifact.
    #[must_use]
    pub fn skipped_stages(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|report| report.is_skipped())
            .map(|report| report.stage.as_str())
            .collect()
    }

    /// Returns the names of stages that ran their transform.
    #[must_use]
    pub fn executed_stages(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|report| !report.is_skipped())
            .map(|report| report.stage.as_str())
            .collect()
    }

    /// Returns the number of failed items across all stages.
    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.reports.iter().map(|report| report.failed).sum()
    }
}

/// An ordered list of stages sharing one store, ledger and fetch engine.
///
/// Built with [`super::PipelineBuilder`].
pub struct Pipeline {
    name: String,
    stages: Vec<StageSpec>,
    store: Arc<dyn ArtifactStore>,
    ledger: CacheLedger,
    engine: BatchFetchEngine,
    settings: SettingsSnapshot,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("ledger", &self.ledger)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub(crate) fn new(
        name: String,
        stages: Vec<StageSpec>,
        store: Arc<dyn ArtifactStore>,
        ledger: CacheLedger,
        engine: BatchFetchEngine,
        settings: SettingsSnapshot,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            stages,
            store,
            ledger,
            engine,
            settings,
            events,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage specifications in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|spec| spec.name.as_str()).collect()
    }

    /// Returns the artifact store, the sole access path for reporting.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Returns the cache ledger.
    #[must_use]
    pub fn ledger(&self) -> &CacheLedger {
        &self.ledger
    }

    /// Returns the snapshot that keys the cache.
    #[must_use]
    pub fn settings(&self) -> &SettingsSnapshot {
        &self.settings
    }

    /// Runs every stage in order.
    ///
    /// The ledger is reconciled first: a run on the same day with the same
    /// settings resumes after the last completed stage. Each stage starts
    /// only after its predecessor is completed or skipped.
    ///
    /// # Errors
    ///
    /// Stops at the first stage that fails; stages already completed stay
    /// marked in the ledger.
    pub async fn run(&self) -> Result<PipelineResult, ScreenflowError> {
        let run_id = Uuid::new_v4();
        self.run_stages(run_id)
            .instrument(pipeline_span(&self.name, &run_id))
            .await
    }

    async fn run_stages(&self, run_id: Uuid) -> Result<PipelineResult, ScreenflowError> {
        let started = Instant::now();
        let mut entry = self.ledger.reconcile(&self.settings).await?;

        info!(
            pipeline = %self.name,
            run_id = %run_id,
            fingerprint = %entry.fingerprint.short(),
            stages = self.stages.len(),
            "Starting pipeline run"
        );
        self.events
            .emit(
                names::PIPELINE_STARTED,
                Some(json!({
                    "pipeline": self.name,
                    "run_id": run_id.to_string(),
                    "fingerprint": entry.fingerprint.as_str(),
                    "stages": self.stage_names(),
                })),
            )
            .await;

        let mut reports = Vec::with_capacity(self.stages.len());
        let mut final_artifact = None;
        for spec in &self.stages {
            let mut orchestrator = StageOrchestrator::new(
                spec,
                self.store.as_ref(),
                &self.ledger,
                &self.engine,
                self.events.as_ref(),
            );
            let outcome = orchestrator
                .run(&mut entry)
                .instrument(stage_span(&spec.name, spec.kind()))
                .await;
            match outcome {
                Ok(run) => {
                    reports.push(run.report);
                    final_artifact = Some(run.artifact);
                }
                Err(err) => {
                    error!(pipeline = %self.name, stage = %spec.name, error = %err, "Pipeline run aborted");
                    return Err(err);
                }
            }
        }

        let final_artifact = final_artifact
            .ok_or_else(|| ScreenflowError::Internal("pipeline has no stages".to_string()))?;
        let result = PipelineResult {
            run_id,
            fingerprint: entry.fingerprint,
            reports,
            final_artifact,
            elapsed: started.elapsed(),
        };

        info!(
            pipeline = %self.name,
            run_id = %run_id,
            executed = result.executed_stages().len(),
            skipped = result.skipped_stages().len(),
            records = result.final_artifact.len(),
            duration_ms = duration_ms(result.elapsed),
            "Pipeline run completed"
        );
        self.events
            .emit(
                names::PIPELINE_COMPLETED,
                Some(json!({
                    "pipeline": self.name,
                    "run_id": run_id.to_string(),
                    "executed": result.executed_stages(),
                    "skipped": result.skipped_stages(),
                    "records": result.final_artifact.len(),
                    "duration_ms": duration_ms(result.elapsed),
                })),
            )
            .await;

        Ok(result)
    }
}
