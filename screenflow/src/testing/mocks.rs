//! Scripted fetchers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::core::Record;
use crate::errors::ItemFailure;
use crate::fetch::ItemFetcher;
use crate::stages::RecordFetcher;

/// Session handed out by the scripted fetchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedSession {
    /// Worker that opened the session.
    pub worker: usize,
    /// Items fetched through this session.
    pub uses: usize,
}

impl ScriptedSession {
    /// Creates an unused session for `worker`.
    #[must_use]
    pub fn new(worker: usize) -> Self {
        Self { worker, uses: 0 }
    }
}

#[derive(Debug, Default)]
struct Counters {
    calls: usize,
    opened: usize,
    closed: usize,
}

/// An [`ItemFetcher`] over indices with scripted failures.
///
/// Item `i` yields a record for symbol `SYM{i:03}` unless it is scripted to
/// fail, panic or stall. Counts calls and sessions so tests can check reuse
/// and cleanup.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    total: usize,
    fail_on: BTreeSet<usize>,
    panic_on: BTreeSet<usize>,
    slow_on: BTreeSet<usize>,
    slow_latency: Duration,
    latency: Duration,
    fallback: bool,
    fallback_panics: bool,
    fail_sessions: bool,
    counters: Mutex<Counters>,
}

impl ScriptedFetcher {
    /// Creates a fetcher over `total` items that all succeed.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Makes the given items fail.
    #[must_use]
    pub fn with_failures(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.fail_on.extend(indices);
        self
    }

    /// Makes the given items panic.
    #[must_use]
    pub fn with_panics(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.panic_on.extend(indices);
        self
    }

    /// Adds latency to every item.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the given items take `latency` longer.
    #[must_use]
    pub fn with_slow_items(
        mut self,
        indices: impl IntoIterator<Item = usize>,
        latency: Duration,
    ) -> Self {
        self.slow_on.extend(indices);
        self.slow_latency = latency;
        self
    }

    /// Offers a bare symbol record for failed items.
    #[must_use]
    pub fn with_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Makes the fallback for a failed item panic.
    #[must_use]
    pub fn with_panicking_fallback(mut self) -> Self {
        self.fallback_panics = true;
        self
    }

    /// Makes every session open fail.
    #[must_use]
    pub fn with_failing_sessions(mut self) -> Self {
        self.fail_sessions = true;
        self
    }

    /// Returns the number of items fetched.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.counters.lock().calls
    }

    /// Returns the number of sessions opened.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.counters.lock().opened
    }

    /// Returns the number of sessions closed.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.counters.lock().closed
    }

    /// Returns the number of items this fetcher was scripted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    fn symbol(index: usize) -> String {
        format!("SYM{index:03}")
    }
}

#[async_trait]
impl ItemFetcher for ScriptedFetcher {
    type Session = ScriptedSession;

    async fn open_session(&self, worker: usize) -> Result<ScriptedSession, ItemFailure> {
        if self.fail_sessions {
            return Err(ItemFailure::Session("scripted session failure".to_string()));
        }
        self.counters.lock().opened += 1;
        Ok(ScriptedSession::new(worker))
    }

    async fn fetch(
        &self,
        session: &mut ScriptedSession,
        index: usize,
    ) -> Result<Record, ItemFailure> {
        self.counters.lock().calls += 1;
        session.uses += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.slow_on.contains(&index) {
            tokio::time::sleep(self.slow_latency).await;
        }
        if self.panic_on.contains(&index) {
            panic!("scripted panic at {index}");
        }
        if self.fail_on.contains(&index) {
            return Err(ItemFailure::Fetch(format!("scripted failure at {index}")));
        }

        Ok(Record::for_symbol(Self::symbol(index)).with("index", index))
    }

    async fn fallback(&self, index: usize, _failure: &ItemFailure) -> Option<Record> {
        if self.fallback_panics {
            panic!("scripted fallback panic at {index}");
        }
        self.fallback
            .then(|| Record::for_symbol(Self::symbol(index)))
    }

    fn close_session(&self, _worker: usize, _session: ScriptedSession) {
        self.counters.lock().closed += 1;
    }

    fn describe(&self, index: usize) -> String {
        Self::symbol(index)
    }
}

/// A [`RecordFetcher`] that marks each input record as fetched.
///
/// Records for the scripted symbols fail. Used to drive fetch stages
/// through the full pipeline.
#[derive(Debug, Default)]
pub struct ScriptedRecordFetcher {
    failing: BTreeSet<String>,
    latency: Duration,
    fallback: bool,
    counters: Mutex<Counters>,
}

impl ScriptedRecordFetcher {
    /// Creates a fetcher where every record succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the given symbols fail.
    #[must_use]
    pub fn with_failing_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Adds latency to every record.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Keeps failed records as flagged fallbacks.
    #[must_use]
    pub fn with_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Returns the number of records fetched.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.counters.lock().calls
    }

    /// Returns the number of sessions opened.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.counters.lock().opened
    }

    /// Returns the number of sessions closed.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.counters.lock().closed
    }
}

#[async_trait]
impl RecordFetcher for ScriptedRecordFetcher {
    type Session = ScriptedSession;

    async fn open_session(&self, worker: usize) -> Result<ScriptedSession, ItemFailure> {
        self.counters.lock().opened += 1;
        Ok(ScriptedSession::new(worker))
    }

    async fn fetch(
        &self,
        session: &mut ScriptedSession,
        record: &Record,
    ) -> Result<Record, ItemFailure> {
        self.counters.lock().calls += 1;
        session.uses += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let symbol = record.symbol().unwrap_or_default();
        if self.failing.contains(symbol) {
            return Err(ItemFailure::Fetch(format!("no data for {symbol}")));
        }
        Ok(record.clone().with("fetched", true))
    }

    async fn fallback(&self, record: &Record, _failure: &ItemFailure) -> Option<Record> {
        self.fallback.then(|| record.clone())
    }

    fn close_session(&self, _worker: usize, _session: ScriptedSession) {
        self.counters.lock().closed += 1;
    }
}
