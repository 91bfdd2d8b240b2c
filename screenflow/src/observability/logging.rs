//! Tracing subscriber setup and pipeline spans.

use crate::core::StageKind;
use crate::errors::{ConfigError, ScreenflowError};
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. With `json`, events
/// are written as one JSON object per line.
///
/// # Errors
///
/// Returns [`ScreenflowError::Config`] for an unparsable `level`, and
/// [`ScreenflowError::Internal`] if a global subscriber is already set.
pub fn init_tracing(level: &str, json: bool) -> Result<(), ScreenflowError> {
    let filter = env_filter(level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| ScreenflowError::Internal(format!("tracing already initialised: {err}")))
}

fn env_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| ConfigError::invalid("log_level", err.to_string()))
}

/// Span covering one pipeline run.
pub fn pipeline_span(pipeline: &str, run_id: &uuid::Uuid) -> Span {
    tracing::info_span!("pipeline", name = %pipeline, run_id = %run_id)
}

/// Span covering one stage.
pub fn stage_span(stage: &str, kind: StageKind) -> Span {
    tracing::info_span!("stage", name = %stage, kind = %kind)
}
