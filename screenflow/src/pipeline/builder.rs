//! Pipeline builder with validation.

use super::{Pipeline, StageSpec, StageTransform};
use crate::core::StageKind;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::fetch::{BatchFetchEngine, FetchConfig};
use crate::settings::{ScreenConfig, SettingsSnapshot};
use crate::stages::{RecordFetcher, RecordFilter, RecordSource};
use crate::store::{ArtifactStore, CacheLedger, FileArtifactStore};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Stages are added in execution order; each stage reads the artifact of
/// the stage added before it. Unless replaced, artifacts and the ledger live
/// on disk under the state directory.
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    state_dir: PathBuf,
    store: Option<Arc<dyn ArtifactStore>>,
    ledger: Option<CacheLedger>,
    fetch: FetchConfig,
    settings: Option<SettingsSnapshot>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("state_dir", &self.state_dir)
            .field("fetch", &self.fetch)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = ScreenConfig::default();
        Self {
            name: name.into(),
            stages: Vec::new(),
            state_dir: defaults.state_dir,
            store: None,
            ledger: None,
            fetch: defaults.fetch,
            settings: None,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Creates a builder using a loaded configuration: its state directory,
    /// fetch settings and settings snapshot.
    #[must_use]
    pub fn from_config(name: impl Into<String>, config: &ScreenConfig) -> Self {
        Self::new(name)
            .with_state_dir(config.state_dir.clone())
            .with_fetch_config(config.fetch.clone())
            .with_settings(config.snapshot())
    }

    /// Sets the directory for the default file store and ledger.
    #[must_use]
    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// Replaces the artifact store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the cache ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: CacheLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Sets the fetch engine settings.
    #[must_use]
    pub fn with_fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Sets the snapshot that keys the cache.
    ///
    /// The fetch settings are always added on build, overriding any keys of
    /// the same name, so the cache key matches the engine that runs.
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsSnapshot) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the event sink for the pipeline, the engine and a default
    /// ledger.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Adds a source stage.
    #[must_use]
    pub fn source(self, name: impl Into<String>, source: impl RecordSource + 'static) -> Self {
        self.stage(name, StageTransform::source(source))
    }

    /// Adds a filter stage.
    #[must_use]
    pub fn filter(self, name: impl Into<String>, filter: impl RecordFilter + 'static) -> Self {
        self.stage(name, StageTransform::filter(filter))
    }

    /// Adds a fetch stage.
    #[must_use]
    pub fn fetch<R: RecordFetcher>(self, name: impl Into<String>, fetcher: R) -> Self {
        self.stage(name, StageTransform::fetch(fetcher))
    }

    /// Adds a stage reading the artifact of the previously added stage.
    #[must_use]
    pub fn stage(mut self, name: impl Into<String>, transform: StageTransform) -> Self {
        let mut spec = StageSpec::new(name, transform);
        spec.input = self.stages.last().map(|previous| previous.name.clone());
        self.stages.push(spec);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline has no stages, a stage name is
    /// invalid or repeated, or the first stage is not the only source.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        self.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| -> Arc<dyn ArtifactStore> {
                Arc::new(FileArtifactStore::new(&self.state_dir))
            });
        let ledger = self.ledger.unwrap_or_else(|| {
            CacheLedger::new(&self.state_dir).with_event_sink(Arc::clone(&self.events))
        });
        let settings = self.fetch.add_to_snapshot(self.settings.unwrap_or_default());
        let engine = BatchFetchEngine::new(self.fetch).with_event_sink(Arc::clone(&self.events));

        Ok(Pipeline::new(
            self.name,
            self.stages,
            store,
            ledger,
            engine,
            settings,
            self.events,
        ))
    }

    fn validate(&self) -> Result<(), PipelineValidationError> {
        let Some(first) = self.stages.first() else {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add a source stage before building."),
                ));
        };

        if first.kind() != StageKind::Source {
            return Err(PipelineValidationError::new(format!(
                "First stage '{}' is a {} stage; a pipeline must start with a source",
                first.name,
                first.kind()
            ))
            .with_stages(vec![first.name.clone()])
            .with_error_info(
                ContractErrorInfo::new("PIPELINE-NO_SOURCE", "Pipeline does not start with a source")
                    .with_fix_hint("Add the stage that produces the initial records first."),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.stages {
            spec.validate()?;

            if !seen.insert(spec.name.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' is defined more than once",
                    spec.name
                ))
                .with_stages(vec![spec.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-DUPLICATE_STAGE",
                        format!("Duplicate stage name '{}'", spec.name),
                    )
                    .with_fix_hint("Stage names are artifact names and must be unique."),
                ));
            }

            if spec.input.is_some() && spec.kind() == StageKind::Source {
                return Err(PipelineValidationError::new(format!(
                    "Source stage '{}' is not the first stage",
                    spec.name
                ))
                .with_stages(vec![first.name.clone(), spec.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-NO_SOURCE",
                        "Only the first stage may be a source",
                    )
                    .with_fix_hint("Start a separate pipeline for a second listing."),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{FnFilter, FnSource};
    use crate::store::InMemoryArtifactStore;
    use crate::testing::{symbol_records, ScriptedRecordFetcher};
    use pretty_assertions::assert_eq;

    fn keep_all() -> impl RecordFilter {
        FnFilter::new(|record| Ok(Some(record)))
    }

    fn listing() -> impl RecordSource {
        FnSource::from_records(symbol_records(&["A", "B"]))
    }

    fn code(result: Result<Pipeline, PipelineValidationError>) -> String {
        result.unwrap_err().code().unwrap_or_default().to_string()
    }

    #[test]
    fn test_build_chains_inputs() {
        let pipeline = PipelineBuilder::new("screen")
            .with_store(Arc::new(InMemoryArtifactStore::new()))
            .source("listing", listing())
            .filter("liquidity", keep_all())
            .fetch("enriched", ScriptedRecordFetcher::new())
            .build()
            .unwrap();

        assert_eq!(pipeline.stage_names(), vec!["listing", "liquidity", "enriched"]);
        let inputs: Vec<_> = pipeline.stages().iter().map(|s| s.input.as_deref()).collect();
        assert_eq!(inputs, vec![None, Some("listing"), Some("liquidity")]);
    }

    #[test]
    fn test_empty_pipeline() {
        assert_eq!(code(PipelineBuilder::new("screen").build()), "PIPELINE-EMPTY");
    }

    #[test]
    fn test_first_stage_must_be_source() {
        let result = PipelineBuilder::new("screen").filter("liquidity", keep_all()).build();
        assert_eq!(code(result), "PIPELINE-NO_SOURCE");
    }

    #[test]
    fn test_second_source_rejected() {
        let result = PipelineBuilder::new("screen")
            .source("listing", listing())
            .source("other", listing())
            .build();
        assert_eq!(code(result), "PIPELINE-NO_SOURCE");
    }

    #[test]
    fn test_duplicate_stage() {
        let result = PipelineBuilder::new("screen")
            .source("listing", listing())
            .filter("liquidity", keep_all())
            .filter("liquidity", keep_all())
            .build();
        let err = result.unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-DUPLICATE_STAGE"));
        assert_eq!(err.stages, vec!["liquidity".to_string()]);
    }

    #[test]
    fn test_invalid_name() {
        let result = PipelineBuilder::new("screen")
            .source("listing", listing())
            .filter("a/b", keep_all())
            .build();
        assert_eq!(code(result), "PIPELINE-INVALID_NAME");
    }

    #[test]
    fn test_from_config_uses_snapshot() {
        let config = ScreenConfig::default();
        let pipeline = PipelineBuilder::from_config("screen", &config)
            .with_store(Arc::new(InMemoryArtifactStore::new()))
            .source("listing", listing())
            .build()
            .unwrap();
        assert_eq!(pipeline.settings(), &config.snapshot());
    }

    #[test]
    fn test_fetch_settings_always_key_the_cache() {
        let pipeline = PipelineBuilder::new("screen")
            .with_store(Arc::new(InMemoryArtifactStore::new()))
            .with_fetch_config(FetchConfig::new().with_threads(2).with_batch_size(7))
            .with_settings(SettingsSnapshot::new().with("min_rs", 80).with("threads", 16))
            .source("listing", listing())
            .build()
            .unwrap();

        let settings = pipeline.settings();
        assert_eq!(settings.get("min_rs"), Some(&serde_json::json!(80)));
        assert_eq!(settings.get("threads"), Some(&serde_json::json!(2)));
        assert_eq!(settings.get("batch_size"), Some(&serde_json::json!(7)));
        assert!(settings.get("stage_deadline_secs").is_some());
    }
}
