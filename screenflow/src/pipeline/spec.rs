//! Stage specifications.

use super::fetch_stage::{FetchRunner, RecordFetchRunner};
use crate::core::StageKind;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::{RecordFetcher, RecordFilter, RecordSource};
use crate::utils::validate_stage_name;
use std::fmt;
use std::sync::Arc;

/// The transform a stage applies to its input.
#[derive(Clone)]
pub enum StageTransform {
    /// Produces the first artifact.
    Source(Arc<dyn RecordSource>),
    /// Keeps or drops each input record, single-threaded.
    Filter(Arc<dyn RecordFilter>),
    /// Enriches each input record on the batch fetch engine.
    Fetch(Arc<dyn FetchRunner>),
}

impl StageTransform {
    /// Wraps a source.
    pub fn source(source: impl RecordSource + 'static) -> Self {
        Self::Source(Arc::new(source))
    }

    /// Wraps a filter.
    pub fn filter(filter: impl RecordFilter + 'static) -> Self {
        Self::Filter(Arc::new(filter))
    }

    /// Wraps a fetcher.
    pub fn fetch<R: RecordFetcher>(fetcher: R) -> Self {
        Self::fetch_shared(Arc::new(fetcher))
    }

    /// Wraps a fetcher the caller keeps a handle to.
    pub fn fetch_shared<R: RecordFetcher>(fetcher: Arc<R>) -> Self {
        Self::Fetch(Arc::new(RecordFetchRunner::new(fetcher)))
    }

    /// Returns the kind of transform.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Source(_) => StageKind::Source,
            Self::Filter(_) => StageKind::Filter,
            Self::Fetch(_) => StageKind::Fetch,
        }
    }
}

impl fmt::Debug for StageTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageTransform::{}", self.kind())
    }
}

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage; also its artifact name.
    pub name: String,
    /// The stage whose artifact this stage reads. `None` for sources.
    pub input: Option<String>,
    /// The transform.
    pub transform: StageTransform,
}

impl StageSpec {
    /// Creates a stage specification with no input.
    #[must_use]
    pub fn new(name: impl Into<String>, transform: StageTransform) -> Self {
        Self {
            name: name.into(),
            input: None,
            transform,
        }
    }

    /// Sets the stage this one reads from.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Returns the kind of transform.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.transform.kind()
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name cannot be used as an artifact name.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        validate_stage_name(&self.name).map_err(|err| {
            PipelineValidationError::new(err.to_string())
                .with_stages(vec![self.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-INVALID_NAME",
                        format!("Stage name '{}' is not a valid artifact name", self.name),
                    )
                    .with_fix_hint(
                        "Use letters, digits, '_', '-' or '.', and do not start with '.'.",
                    ),
                )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{FnFilter, FnSource};
    use crate::testing::ScriptedRecordFetcher;

    #[test]
    fn test_kinds() {
        let source = StageTransform::source(FnSource::from_records(Vec::new()));
        let filter = StageTransform::filter(FnFilter::new(|r| Ok(Some(r))));
        let fetch = StageTransform::fetch(ScriptedRecordFetcher::new());

        assert_eq!(source.kind(), StageKind::Source);
        assert_eq!(filter.kind(), StageKind::Filter);
        assert_eq!(fetch.kind(), StageKind::Fetch);
        assert_eq!(format!("{fetch:?}"), "StageTransform::fetch");
    }

    #[test]
    fn test_validate_name() {
        let transform = StageTransform::filter(FnFilter::new(|r| Ok(Some(r))));
        assert!(StageSpec::new("revenue_growth", transform.clone()).validate().is_ok());

        let err = StageSpec::new("../escape", transform).validate().unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-INVALID_NAME"));
        assert_eq!(err.stages, vec!["../escape".to_string()]);
    }
}
