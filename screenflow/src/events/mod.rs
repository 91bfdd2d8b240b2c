//! Lifecycle events.
//!
//! The pipeline, the cache ledger and the fetch engine report what they do
//! through an [`EventSink`]. Event type names live in [`names`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names.
pub mod names {
    /// A pipeline run began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A pipeline run finished.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A stage began executing its transform.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage reused its cached artifact.
    pub const STAGE_SKIPPED: &str = "stage.skipped";
    /// A stage persisted its artifact and was marked complete.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A fetch batch finished and its checkpoint was written.
    pub const FETCH_CHECKPOINT: &str = "fetch.checkpoint";
    /// A fetch stage stopped early on its deadline.
    pub const FETCH_DEADLINE_EXCEEDED: &str = "fetch.deadline_exceeded";
    /// The ledger was replaced with a fresh entry.
    pub const LEDGER_RESET: &str = "ledger.reset";
}
