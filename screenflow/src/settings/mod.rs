//! Configuration and the cache key derived from it.
//!
//! - [`ScreenConfig`] is the JSON configuration file
//! - [`SettingsSnapshot`] is the immutable subset that shapes output
//! - [`fingerprint`] digests a snapshot into the ledger's cache key

mod config;
mod fingerprint;
mod snapshot;

pub use config::{ScreenConfig, Thresholds, TrendSettings};
pub use fingerprint::{fingerprint, Fingerprint};
pub use snapshot::SettingsSnapshot;
