//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications and transforms
//! - Pipeline builder with validation
//! - The per-stage orchestrator and the sequential runner

mod builder;
mod fetch_stage;
mod orchestrator;
mod runner;
mod spec;


pub use builder::PipelineBuilder;
pub use fetch_stage::FetchRunner;
pub use orchestrator::{StageOrchestrator, StageRun};
pub use runner::{Pipeline, PipelineResult};
pub use spec::{StageSpec, StageTransform};
