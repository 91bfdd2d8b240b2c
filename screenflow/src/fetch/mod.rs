//! Bounded-concurrency, checkpointed fetching.
//!
//! This module provides:
//! - [`ItemFetcher`], the per-item function with worker-local sessions
//! - [`BatchFetchEngine`], which runs it over a stage's items in
//!   checkpointed batches under a wall-clock deadline
//! - [`FetchConfig`], the worker pool and time-budget settings

mod accumulator;
mod config;
mod engine;
mod session;

pub use accumulator::{BatchAccumulator, FetchFailure};
pub use config::FetchConfig;
pub use engine::{BatchFetchEngine, FetchReport};
pub use session::{ItemFetcher, SessionArena};
