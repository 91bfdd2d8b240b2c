//! The cache ledger: which stages finished under which settings, today.
//!
//! The ledger is a single JSON file holding one [`LedgerEntry`]. It is
//! rewritten whole on every change. A run may skip a stage only when the
//! entry was written today under the same settings fingerprint, the stage
//! is listed as completed, and its artifact still exists.

use super::file::write_atomic;
use super::ArtifactStore;
use crate::errors::ScreenflowError;
use crate::events::{names, EventSink, NoOpEventSink};
use crate::settings::{fingerprint, Fingerprint, SettingsSnapshot};
use crate::utils::{Clock, SystemClock};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The persisted ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Fingerprint of the settings the stages ran under.
    pub fingerprint: Fingerprint,
    /// Calendar day of the run.
    pub day: NaiveDate,
    /// Names of completed stages.
    #[serde(default)]
    pub completed: BTreeSet<String>,
    /// The snapshot behind the fingerprint, kept for diagnostics.
    #[serde(default)]
    pub settings: SettingsSnapshot,
}

impl LedgerEntry {
    /// Creates an entry with no completed stages.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, day: NaiveDate, settings: SettingsSnapshot) -> Self {
        Self {
            fingerprint,
            day,
            completed: BTreeSet::new(),
            settings,
        }
    }

    /// Returns true if the stage is listed as completed.
    #[must_use]
    pub fn is_complete(&self, stage: &str) -> bool {
        self.completed.contains(stage)
    }
}

/// Why [`CacheLedger::reconcile`] started a fresh entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// No ledger file existed.
    NoLedger,
    /// The ledger file could not be read or parsed.
    Corrupt,
    /// The settings fingerprint differs.
    SettingsChanged,
    /// The entry was written on another day.
    NewDay,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLedger => write!(f, "no_ledger"),
            Self::Corrupt => write!(f, "corrupt"),
            Self::SettingsChanged => write!(f, "settings_changed"),
            Self::NewDay => write!(f, "new_day"),
        }
    }
}

enum LedgerState {
    Absent,
    Corrupt,
    Present(LedgerEntry),
}

/// Handle to the ledger file.
///
/// Owned by the pipeline and passed to each stage orchestrator in turn;
/// stages run sequentially, so the ledger never has concurrent writers.
pub struct CacheLedger {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for CacheLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLedger")
            .field("path", &self.path)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl CacheLedger {
    /// Creates a ledger at `<state_dir>/ledger.json`.
    #[must_use]
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self::at_path(state_dir.as_ref().join("ledger.json"))
    }

    /// Creates a ledger at an explicit file path.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: Arc::new(SystemClock),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the clock that supplies "today".
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted entry.
    ///
    /// A missing, unreadable or malformed file yields `None`.
    pub async fn load(&self) -> Option<LedgerEntry> {
        match self.read_state().await {
            LedgerState::Present(entry) => Some(entry),
            LedgerState::Absent | LedgerState::Corrupt => None,
        }
    }

    /// Returns the entry to run under for `snapshot`.
    ///
    /// The persisted entry is reused, completed stages included, when its
    /// fingerprint and day match. Otherwise a fresh entry is persisted
    /// immediately and returned.
    pub async fn reconcile(
        &self,
        snapshot: &SettingsSnapshot,
    ) -> Result<LedgerEntry, ScreenflowError> {
        let fingerprint = fingerprint(snapshot);
        let today = self.clock.today();

        let reason = match self.read_state().await {
            LedgerState::Present(entry) if entry.fingerprint == fingerprint && entry.day == today => {
                info!(
                    fingerprint = %fingerprint.short(),
                    completed = entry.completed.len(),
                    "Resuming from cache ledger"
                );
                return Ok(entry);
            }
            LedgerState::Present(entry) if entry.fingerprint != fingerprint => {
                ResetReason::SettingsChanged
            }
            LedgerState::Present(_) => ResetReason::NewDay,
            LedgerState::Corrupt => ResetReason::Corrupt,
            LedgerState::Absent => ResetReason::NoLedger,
        };

        let entry = LedgerEntry::new(fingerprint, today, snapshot.clone());
        self.persist(&entry).await?;

        info!(
            reason = %reason,
            fingerprint = %entry.fingerprint.short(),
            day = %entry.day,
            "Starting fresh cache ledger"
        );
        self.events
            .emit(
                names::LEDGER_RESET,
                Some(json!({
                    "reason": reason.to_string(),
                    "fingerprint": entry.fingerprint.as_str(),
                    "day": entry.day.to_string(),
                })),
            )
            .await;

        Ok(entry)
    }

    /// Adds `stage` to the completed set and persists the entry.
    ///
    /// Returns whether the stage was newly added. Marking a stage twice is a
    /// no-op that leaves the file untouched.
    pub async fn mark_complete(
        &self,
        entry: &mut LedgerEntry,
        stage: &str,
    ) -> Result<bool, ScreenflowError> {
        if !entry.completed.insert(stage.to_string()) {
            debug!(stage = %stage, "Stage already marked complete");
            return Ok(false);
        }
        if let Err(err) = self.persist(entry).await {
            entry.completed.remove(stage);
            return Err(err);
        }
        debug!(stage = %stage, completed = entry.completed.len(), "Stage marked complete");
        Ok(true)
    }

    /// Returns true if `stage` may reuse its cached artifact.
    ///
    /// Requires the stage to be completed in `entry` and its artifact to
    /// exist in `store`. A ledger that is ahead of the store, or a store that
    /// cannot answer, forces a re-run.
    pub async fn should_skip(
        &self,
        entry: &LedgerEntry,
        stage: &str,
        store: &dyn ArtifactStore,
    ) -> bool {
        if !entry.is_complete(stage) {
            return false;
        }
        match store.exists(stage).await {
            Ok(true) => true,
            Ok(false) => {
                info!(stage = %stage, "Ledger lists stage as complete but its artifact is gone; re-running");
                false
            }
            Err(err) => {
                warn!(stage = %stage, error = %err, "Could not check cached artifact; re-running");
                false
            }
        }
    }

    async fn read_state(&self) -> LedgerState {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return LedgerState::Absent,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Cache ledger unreadable; ignoring it");
                return LedgerState::Corrupt;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => LedgerState::Present(entry),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Cache ledger malformed; ignoring it");
                LedgerState::Corrupt
            }
        }
    }

    async fn persist(&self, entry: &LedgerEntry) -> Result<(), ScreenflowError> {
        let bytes = serde_json::to_vec_pretty(entry)?;
        write_atomic(&self.path, &bytes).await?;
        Ok(())
    }
}
