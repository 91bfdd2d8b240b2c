//! Runs record fetchers on the batch fetch engine.

use crate::core::Record;
use crate::errors::{ItemFailure, ScreenflowError};
use crate::fetch::{BatchFetchEngine, FetchReport, ItemFetcher};
use crate::stages::RecordFetcher;
use crate::store::ArtifactStore;
use async_trait::async_trait;
use std::sync::Arc;

/// A fetch stage's transform, with its fetcher type erased.
#[async_trait]
pub trait FetchRunner: Send + Sync {
    /// Fetches every record of `input` for `stage` on `engine`.
    async fn run(
        &self,
        engine: &BatchFetchEngine,
        stage: &str,
        input: Vec<Record>,
        store: &dyn ArtifactStore,
    ) -> Result<FetchReport, ScreenflowError>;
}

pub(crate) struct RecordFetchRunner<R> {
    fetcher: Arc<R>,
}

impl<R> RecordFetchRunner<R> {
    pub(crate) fn new(fetcher: Arc<R>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl<R: RecordFetcher> FetchRunner for RecordFetchRunner<R> {
    async fn run(
        &self,
        engine: &BatchFetchEngine,
        stage: &str,
        input: Vec<Record>,
        store: &dyn ArtifactStore,
    ) -> Result<FetchReport, ScreenflowError> {
        let total = input.len();
        let items = Arc::new(InputFetcher {
            fetcher: Arc::clone(&self.fetcher),
            input,
        });
        engine.run(stage, total, items, store).await
    }
}

/// Adapts a [`RecordFetcher`] to item indices of an input artifact.
struct InputFetcher<R> {
    fetcher: Arc<R>,
    input: Vec<Record>,
}

impl<R> InputFetcher<R> {
    fn record(&self, index: usize) -> Result<&Record, ItemFailure> {
        self.input
            .get(index)
            .ok_or_else(|| ItemFailure::MissingData(format!("no input record at index {index}")))
    }
}

#[async_trait]
impl<R: RecordFetcher> ItemFetcher for InputFetcher<R> {
    type Session = R::Session;

    async fn open_session(&self, worker: usize) -> Result<R::Session, ItemFailure> {
        self.fetcher.open_session(worker).await
    }

    async fn fetch(&self, session: &mut R::Session, index: usize) -> Result<Record, ItemFailure> {
        let record = self.record(index)?;
        self.fetcher.fetch(session, record).await
    }

    async fn fallback(&self, index: usize, failure: &ItemFailure) -> Option<Record> {
        let record = self.input.get(index)?;
        self.fetcher.fallback(record, failure).await
    }

    fn close_session(&self, worker: usize, session: R::Session) {
        self.fetcher.close_session(worker, session);
    }

    fn describe(&self, index: usize) -> String {
        self.input
            .get(index)
            .and_then(Record::symbol)
            .map_or_else(|| format!("#{index}"), ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use crate::store::InMemoryArtifactStore;
    use crate::testing::{symbol_records, ScriptedRecordFetcher};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_runs_fetcher_over_input_records() {
        let store = InMemoryArtifactStore::new();
        let fetcher = Arc::new(ScriptedRecordFetcher::new().with_failing_symbols(["B"]));
        let runner = RecordFetchRunner::new(Arc::clone(&fetcher));
        let engine = BatchFetchEngine::new(FetchConfig::new().with_threads(2).with_batch_size(2));

        let report = runner
            .run(&engine, "enriched", symbol_records(&["A", "B", "C"]), &store)
            .await
            .unwrap();

        assert_eq!(report.artifact.symbols(), vec!["A", "C"]);
        assert_eq!(report.failed_ids(), vec!["B".to_string()]);
        assert!(report
            .artifact
            .iter()
            .all(|r| r.get("fetched") == Some(&serde_json::json!(true))));
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(fetcher.sessions_opened(), fetcher.sessions_closed());
    }

    #[test]
    fn test_describe_falls_back_to_index() {
        let items = InputFetcher {
            fetcher: Arc::new(ScriptedRecordFetcher::new()),
            input: vec![Record::for_symbol("A"), Record::new()],
        };
        assert_eq!(items.describe(0), "A");
        assert_eq!(items.describe(1), "#1");
        assert_eq!(items.describe(7), "#7");
    }
}
