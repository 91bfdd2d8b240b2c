//! Configuration for the batch fetch engine.

use crate::errors::ConfigError;
use crate::settings::SettingsSnapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool, batching and time-budget settings for fetch stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Items per checkpointed batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Wall-clock budget for a whole fetch stage, in seconds.
    #[serde(default = "default_stage_deadline")]
    pub stage_deadline_secs: f64,
    /// Upper bound for a single item fetch, in seconds.
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: Option<f64>,
}

fn default_threads() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    (cpus * 3 / 4).clamp(1, 10)
}

fn default_batch_size() -> usize {
    10
}

fn default_stage_deadline() -> f64 {
    300.0
}

#[allow(clippy::unnecessary_wraps)]
fn default_item_timeout() -> Option<f64> {
    Some(60.0)
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            batch_size: default_batch_size(),
            stage_deadline_secs: default_stage_deadline(),
            item_timeout_secs: default_item_timeout(),
        }
    }
}

impl FetchConfig {
    /// Creates a fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the stage deadline.
    #[must_use]
    pub fn with_stage_deadline(mut self, deadline: Duration) -> Self {
        self.stage_deadline_secs = deadline.as_secs_f64();
        self
    }

    /// Sets or clears the per-item timeout.
    #[must_use]
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout_secs = timeout.map(|t| t.as_secs_f64());
        self
    }

    /// Gets the stage deadline as a Duration.
    #[must_use]
    pub fn stage_deadline(&self) -> Duration {
        Duration::try_from_secs_f64(self.stage_deadline_secs).unwrap_or(Duration::MAX)
    }

    /// Gets the per-item timeout as a Duration.
    #[must_use]
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Adds the fetch settings to a cache-key snapshot.
    #[must_use]
    pub fn add_to_snapshot(&self, snapshot: SettingsSnapshot) -> SettingsSnapshot {
        snapshot
            .with("threads", self.threads)
            .with("batch_size", self.batch_size)
            .with("stage_deadline_secs", self.stage_deadline_secs)
            .with("item_timeout_secs", self.item_timeout_secs)
    }

    /// Checks that the settings can drive a worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero workers or batch size and
    /// for non-positive time limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::invalid("threads", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if !(self.stage_deadline_secs > 0.0) {
            return Err(ConfigError::invalid("stage_deadline_secs", "must be positive"));
        }
        if let Some(timeout) = self.item_timeout_secs {
            if !(timeout > 0.0) {
                return Err(ConfigError::invalid("item_timeout_secs", "must be positive"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert!((1..=10).contains(&config.threads));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.stage_deadline(), Duration::from_secs(300));
        assert_eq!(config.item_timeout(), Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: FetchConfig = serde_json::from_str(r#"{"threads": 3}"#).unwrap();
        assert_eq!(config.threads, 3);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.item_timeout_secs, Some(60.0));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(FetchConfig::new().with_threads(0).validate().is_err());
        assert!(FetchConfig::new().with_batch_size(0).validate().is_err());

        let mut config = FetchConfig::new();
        config.stage_deadline_secs = 0.0;
        assert!(config.validate().is_err());

        config = FetchConfig::new();
        config.item_timeout_secs = Some(-1.0);
        assert!(config.validate().is_err());

        config.item_timeout_secs = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_builders() {
        let config = FetchConfig::new()
            .with_stage_deadline(Duration::from_millis(250))
            .with_item_timeout(None);
        assert_eq!(config.stage_deadline(), Duration::from_millis(250));
        assert_eq!(config.item_timeout(), None);
    }
}
