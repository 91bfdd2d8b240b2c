//! Error types for screenflow.
//!
//! Two layers of failure exist. [`ScreenflowError`] aborts a pipeline run
//! (a missing predecessor artifact, an unwritable store, an invalid
//! pipeline). [`ItemFailure`] is a value: one item of one stage could not
//! produce a record, which is counted and reported but never aborts the
//! batch or the stage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for screenflow operations.
#[derive(Debug, Error)]
pub enum ScreenflowError {
    /// No artifact has been persisted under the given stage name.
    #[error("No artifact persisted for stage '{stage}'")]
    ArtifactNotFound {
        /// The stage name that was looked up.
        stage: String,
    },

    /// A stage could not find the artifact of the stage it reads from.
    #[error("Stage '{stage}' cannot run: artifact of predecessor stage '{predecessor}' is missing")]
    MissingPredecessorArtifact {
        /// The stage that needed the input.
        stage: String,
        /// The predecessor whose artifact is missing.
        predecessor: String,
    },

    /// A stage name cannot be used as an artifact identifier.
    #[error("Invalid stage name '{name}': {reason}")]
    InvalidStageName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// The configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A source stage could not produce its records.
    #[error("Source of stage '{stage}' failed: {message}")]
    Source {
        /// The source stage name.
        stage: String,
        /// Description of the failure.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScreenflowError {
    /// Creates an artifact not found error.
    #[must_use]
    pub fn artifact_not_found(stage: impl Into<String>) -> Self {
        Self::ArtifactNotFound {
            stage: stage.into(),
        }
    }

    /// Creates a missing predecessor error.
    #[must_use]
    pub fn missing_predecessor(stage: impl Into<String>, predecessor: impl Into<String>) -> Self {
        Self::MissingPredecessorArtifact {
            stage: stage.into(),
            predecessor: predecessor.into(),
        }
    }

    /// Creates a source failure error.
    #[must_use]
    pub fn source(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error means an artifact does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ArtifactNotFound { .. })
    }
}

impl From<serde_json::Error> for ScreenflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Why a single item of a stage did not yield a clean record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ItemFailure {
    /// The per-item time limit elapsed.
    #[error("timed out after {after_ms}ms")]
    Timeout {
        /// The limit that elapsed, in milliseconds.
        after_ms: u64,
    },

    /// The external source returned an error.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The item lacks data the stage needs.
    #[error("missing data: {0}")]
    MissingData(String),

    /// No worker session was available for the item.
    #[error("session unavailable: {0}")]
    Session(String),

    /// The per-item function panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl ItemFailure {
    /// Returns a short machine-readable name for the failure kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Fetch(_) => "fetch",
            Self::MissingData(_) => "missing_data",
            Self::Session(_) => "session",
            Self::Panicked(_) => "panicked",
        }
    }
}

/// Errors raised while loading or validating a [`crate::settings::ScreenConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the config schema.
    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse {
        /// The file path.
        path: PathBuf,
        /// The parser message.
        message: String,
    },

    /// A field holds a value the screener cannot run with.
    #[error("Invalid config value for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition is rejected at build time.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}
