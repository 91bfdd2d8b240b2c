//! # Screenflow
//!
//! Cache-aware, resumable multi-stage screening pipelines.
//!
//! A pipeline is an ordered list of stages. Each stage reads the persisted
//! artifact of its predecessor, filters or enriches its records, and persists
//! its own artifact. Screenflow provides:
//!
//! - **Idempotent re-entrancy**: a cache ledger keyed by a settings
//!   fingerprint and the calendar day lets a rerun skip every stage that
//!   already completed
//! - **Bounded fetching**: fetch stages fan out over a fixed worker pool in
//!   checkpointed batches under a wall-clock deadline, with typed per-item
//!   failures that never abort the batch
//! - **Event-driven observability**: lifecycle events and structured logs
//!   for every stage, batch and ledger reset
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use screenflow::prelude::*;
//!
//! let config = ScreenConfig::load("config.json")?;
//! let thresholds = &config.thresholds;
//! let quote_url = "https://quotes.example.com/v1/{symbol}";
//!
//! let pipeline = PipelineBuilder::from_config("growth-screen", &config)
//!     .source("nasdaq_listings", HttpListingSource::nasdaq())
//!     .filter(
//!         "market_cap",
//!         FieldBounds::new("Market Cap").with_min(thresholds.min_market_cap),
//!     )
//!     .fetch("quotes", HttpFieldFetcher::new(quote_url).with_field("/price", "Price"))
//!     .build()?;
//!
//! let result = pipeline.run().await?;
//! let stages = pipeline.stage_names();
//! println!("{}", render_funnel(&funnel(pipeline.store().as_ref(), &stages).await));
//! println!("{} records after {:?}", result.final_artifact.len(), result.elapsed);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod events;
pub mod fetch;
pub mod observability;
pub mod pipeline;
pub mod reporting;
pub mod settings;
pub mod stages;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{Artifact, Record, StageKind, StageReport, StageStatus};
    pub use crate::errors::{
        ConfigError, ContractErrorInfo, ItemFailure, PipelineValidationError, ScreenflowError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::fetch::{BatchFetchEngine, FetchConfig, FetchReport, ItemFetcher};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        Pipeline, PipelineBuilder, PipelineResult, StageSpec, StageTransform,
    };
    pub use crate::reporting::{funnel, render_funnel, FunnelRow};
    pub use crate::settings::{fingerprint, Fingerprint, ScreenConfig, SettingsSnapshot};
    pub use crate::stages::{
        FieldBounds, FnFilter, FnSource, RecordFetcher, RecordFilter, RecordSource,
        SymbolExclusion,
    };
    #[cfg(feature = "http")]
    pub use crate::stages::{HttpFieldFetcher, HttpListingSource};
    pub use crate::store::{ArtifactStore, CacheLedger, FileArtifactStore, InMemoryArtifactStore};
    pub use crate::utils::{Clock, FixedClock, SystemClock};
}
