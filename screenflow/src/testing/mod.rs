//! Testing utilities for screening pipelines.
//!
//! This module provides:
//! - Scripted fetchers with deterministic failures and call counters
//! - Record and artifact fixtures
//! - Assertions for artifacts and stage reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_stage_counts, assert_stage_status, assert_symbols};
pub use fixtures::{listing_artifact, numbered_records, symbol_records};
pub use mocks::{ScriptedFetcher, ScriptedRecordFetcher, ScriptedSession};
