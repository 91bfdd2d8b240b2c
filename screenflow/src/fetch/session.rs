//! Per-item fetch functions and the worker session arena.

use crate::core::Record;
use crate::errors::ItemFailure;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A fetch-and-transform function applied to item indices.
///
/// Each worker owns one `Session` (for example an HTTP client or a browser
/// handle) and reuses it for every item it processes. Sessions are never
/// shared across workers.
#[async_trait]
pub trait ItemFetcher: Send + Sync + 'static {
    /// Worker-local resource reused across items.
    type Session: Send + 'static;

    /// Opens the session for `worker`.
    async fn open_session(&self, worker: usize) -> Result<Self::Session, ItemFailure>;

    /// Produces the record for item `index`.
    ///
    /// Implementations bound their own network waits; the engine's optional
    /// per-item timeout is a backstop, not a substitute.
    async fn fetch(&self, session: &mut Self::Session, index: usize) -> Result<Record, ItemFailure>;

    /// Offers a record to keep when `fetch` failed for `index`.
    ///
    /// The engine flags any record returned here as missing data. The
    /// default keeps nothing.
    async fn fallback(&self, _index: usize, _failure: &ItemFailure) -> Option<Record> {
        None
    }

    /// Releases a session.
    fn close_session(&self, _worker: usize, _session: Self::Session) {}

    /// Returns the identifier reported for a failed item.
    fn describe(&self, index: usize) -> String {
        index.to_string()
    }
}

/// Session slots indexed by worker id.
///
/// Slots are filled lazily by the workers and handed back after each batch.
/// Dropping the arena closes every open session, which covers normal
/// completion, deadline exit and error returns alike.
pub struct SessionArena<F: ItemFetcher> {
    fetcher: Arc<F>,
    slots: Vec<Option<F::Session>>,
}

impl<F: ItemFetcher> SessionArena<F> {
    /// Creates an arena with `workers` empty slots.
    #[must_use]
    pub fn new(fetcher: Arc<F>, workers: usize) -> Self {
        Self {
            fetcher,
            slots: (0..workers).map(|_| None).collect(),
        }
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the arena has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of slots currently holding a session.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Takes the session out of a worker's slot.
    pub fn take(&mut self, worker: usize) -> Option<F::Session> {
        self.slots.get_mut(worker).and_then(Option::take)
    }

    /// Puts a worker's session back into its slot.
    ///
    /// A session handed back for a slot that already holds one, or for a
    /// worker outside the arena, is closed immediately.
    pub fn put(&mut self, worker: usize, session: F::Session) {
        if let Some(slot) = self.slots.get_mut(worker) {
            if slot.is_none() {
                *slot = Some(session);
                return;
            }
        }
        self.fetcher.close_session(worker, session);
    }

    /// Closes every open session.
    pub fn close_all(&mut self) {
        let mut closed = 0usize;
        for (worker, slot) in self.slots.iter_mut().enumerate() {
            if let Some(session) = slot.take() {
                self.fetcher.close_session(worker, session);
                closed += 1;
            }
        }
        if closed > 0 {
            debug!(closed, "Closed worker sessions");
        }
    }
}

impl<F: ItemFetcher> Drop for SessionArena<F> {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFetcher, ScriptedSession};

    #[test]
    fn test_drop_closes_open_sessions() {
        let fetcher = Arc::new(ScriptedFetcher::new(4));
        {
            let mut arena = SessionArena::new(fetcher.clone(), 3);
            arena.put(0, ScriptedSession::new(0));
            arena.put(2, ScriptedSession::new(2));
            assert_eq!(arena.open_count(), 2);
        }
        assert_eq!(fetcher.sessions_closed(), 2);
    }

    #[test]
    fn test_take_then_put() {
        let fetcher = Arc::new(ScriptedFetcher::new(4));
        let mut arena = SessionArena::new(fetcher.clone(), 2);
        assert!(arena.take(0).is_none());

        arena.put(1, ScriptedSession::new(1));
        let session = arena.take(1).unwrap();
        assert_eq!(arena.open_count(), 0);
        arena.put(1, session);
        assert_eq!(arena.open_count(), 1);
    }

    #[test]
    fn test_put_into_occupied_or_unknown_slot_closes() {
        let fetcher = Arc::new(ScriptedFetcher::new(4));
        let mut arena = SessionArena::new(fetcher.clone(), 1);
        arena.put(0, ScriptedSession::new(0));
        arena.put(0, ScriptedSession::new(0));
        arena.put(5, ScriptedSession::new(5));

        assert_eq!(fetcher.sessions_closed(), 2);
        assert_eq!(arena.open_count(), 1);
    }
}
