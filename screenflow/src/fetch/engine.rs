//! The batch fetch engine.

use super::accumulator::{BatchAccumulator, FetchFailure};
use super::session::{ItemFetcher, SessionArena};
use super::FetchConfig;
use crate::core::Artifact;
use crate::errors::{ItemFailure, ScreenflowError};
use crate::events::{names, EventSink, NoOpEventSink};
use crate::store::ArtifactStore;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of one fetch stage.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// The final artifact, records ordered by input index.
    pub artifact: Artifact,
    /// Items that produced no record, ordered by index.
    pub failures: Vec<FetchFailure>,
    /// Indices whose record is a flagged fallback.
    pub degraded: BTreeSet<usize>,
    /// Number of input items.
    pub total: usize,
    /// Number of items that reached an outcome.
    pub attempted: usize,
    /// Batches processed and checkpointed.
    pub batches_completed: usize,
    /// Batches the input was partitioned into.
    pub batches_total: usize,
    /// Whether the deadline stopped the stage early.
    pub deadline_exceeded: bool,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl FetchReport {
    /// Returns the indices of failed items.
    #[must_use]
    pub fn failed_indices(&self) -> BTreeSet<usize> {
        self.failures.iter().map(|failure| failure.index).collect()
    }

    /// Returns the identifiers of failed items.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<String> {
        self.failures.iter().map(|failure| failure.id.clone()).collect()
    }

    /// Returns the number of items the deadline left untouched.
    #[must_use]
    pub fn not_attempted(&self) -> usize {
        self.total.saturating_sub(self.attempted)
    }
}

enum WorkerExit<S> {
    Finished(S),
    Unavailable(ItemFailure),
}

/// Applies an [`ItemFetcher`] to every item of a stage.
///
/// Items are split into sequential batches of `batch_size`. Each batch is
/// drained by up to `threads` workers pulling indices from a shared cursor,
/// then the records gathered so far are written to the store as a
/// checkpoint. Before each batch the stage deadline is checked; once it has
/// elapsed the stage ends with whatever was checkpointed.
pub struct BatchFetchEngine {
    config: FetchConfig,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for BatchFetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchFetchEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchFetchEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Runs `fetcher` over items `0..total` for `stage`.
    ///
    /// Item failures and the deadline never make this fail; only a
    /// checkpoint that cannot be written does. Worker sessions are closed
    /// before returning on every path.
    pub async fn run<F: ItemFetcher>(
        &self,
        stage: &str,
        total: usize,
        fetcher: Arc<F>,
        store: &dyn ArtifactStore,
    ) -> Result<FetchReport, ScreenflowError> {
        let started = Instant::now();
        let deadline = self.config.stage_deadline();
        let threads = self.config.threads.max(1);
        let batch_size = self.config.batch_size.max(1).min(total.max(1));
        let batches_total = total.div_ceil(batch_size);
        let indices: Vec<usize> = (0..total).collect();

        let accumulator = Arc::new(Mutex::new(BatchAccumulator::new()));
        let mut arena = SessionArena::new(Arc::clone(&fetcher), threads.min(batch_size));
        let mut batches_completed = 0usize;
        let mut deadline_exceeded = false;

        info!(
            stage = %stage,
            total,
            batch_size,
            workers = arena.len(),
            batches = batches_total,
            "Starting fetch stage"
        );

        for (batch_no, batch) in indices.chunks(batch_size).enumerate() {
            let elapsed = started.elapsed();
            if elapsed > deadline {
                deadline_exceeded = true;
                let processed = accumulator.lock().settled_count();
                warn!(
                    stage = %stage,
                    elapsed_s = elapsed.as_secs_f64(),
                    deadline_s = deadline.as_secs_f64(),
                    processed,
                    total,
                    "Stage deadline reached; stopping before batch {}/{}",
                    batch_no + 1,
                    batches_total
                );
                self.events
                    .emit(
                        names::FETCH_DEADLINE_EXCEEDED,
                        Some(json!({
                            "stage": stage,
                            "processed": processed,
                            "total": total,
                            "batches_completed": batches_completed,
                        })),
                    )
                    .await;
                break;
            }

            let workers = threads.min(batch.len());
            self.run_batch(&mut arena, &fetcher, batch, workers, &accumulator)
                .await;

            let checkpoint = accumulator.lock().checkpoint(stage);
            store.write(&checkpoint).await?;
            batches_completed += 1;

            let processed = accumulator.lock().settled_count();
            info!(
                stage = %stage,
                batch = batch_no + 1,
                batches = batches_total,
                records = checkpoint.len(),
                "Checkpoint written: processed {}/{}",
                processed,
                total
            );
            self.events
                .emit(
                    names::FETCH_CHECKPOINT,
                    Some(json!({
                        "stage": stage,
                        "batch": batch_no + 1,
                        "batches": batches_total,
                        "processed": processed,
                        "total": total,
                        "records": checkpoint.len(),
                    })),
                )
                .await;
        }

        if batches_completed == 0 {
            store.write(&Artifact::empty(stage)).await?;
        }
        drop(arena);

        let accumulator = match Arc::try_unwrap(accumulator) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock()),
        };
        let attempted = accumulator.settled_count();
        let (records, failures, degraded) = accumulator.into_parts();

        Ok(FetchReport {
            artifact: Artifact::new(stage, records),
            failures,
            degraded,
            total,
            attempted,
            batches_completed,
            batches_total,
            deadline_exceeded,
            elapsed: started.elapsed(),
        })
    }

    async fn run_batch<F: ItemFetcher>(
        &self,
        arena: &mut SessionArena<F>,
        fetcher: &Arc<F>,
        batch: &[usize],
        workers: usize,
        accumulator: &Arc<Mutex<BatchAccumulator>>,
    ) {
        let items: Arc<[usize]> = Arc::from(batch);
        let cursor = Arc::new(AtomicUsize::new(0));
        let item_timeout = self.config.item_timeout();

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                tokio::spawn(run_worker(
                    Arc::clone(fetcher),
                    worker,
                    arena.take(worker),
                    Arc::clone(&items),
                    Arc::clone(&cursor),
                    Arc::clone(accumulator),
                    item_timeout,
                ))
            })
            .collect();

        let mut worked = false;
        let mut unavailable: Option<ItemFailure> = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(WorkerExit::Finished(session)) => {
                    worked = true;
                    arena.put(worker, session);
                }
                Ok(WorkerExit::Unavailable(failure)) => {
                    warn!(worker, failure = %failure, "Worker could not open a session");
                    unavailable.get_or_insert(failure);
                }
                Err(err) => {
                    warn!(worker, error = %err, "Fetch worker terminated abnormally");
                }
            }
        }

        let mut acc = accumulator.lock();
        for &index in items.iter() {
            if acc.is_settled(index) {
                continue;
            }
            let failure = if worked {
                ItemFailure::Panicked("worker terminated before finishing the item".to_string())
            } else {
                ItemFailure::Session(
                    unavailable
                        .as_ref()
                        .map_or_else(|| "no worker session".to_string(), ToString::to_string),
                )
            };
            acc.record_failure(index, describe(fetcher.as_ref(), index), failure);
        }
    }
}

async fn run_worker<F: ItemFetcher>(
    fetcher: Arc<F>,
    worker: usize,
    slot: Option<F::Session>,
    items: Arc<[usize]>,
    cursor: Arc<AtomicUsize>,
    accumulator: Arc<Mutex<BatchAccumulator>>,
    item_timeout: Option<Duration>,
) -> WorkerExit<F::Session> {
    let mut session = match slot {
        Some(session) => session,
        None => match fetcher.open_session(worker).await {
            Ok(session) => {
                debug!(worker, "Opened worker session");
                session
            }
            Err(failure) => return WorkerExit::Unavailable(failure),
        },
    };

    loop {
        let position = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(&index) = items.get(position) else {
            break;
        };

        match attempt(fetcher.as_ref(), &mut session, index, item_timeout).await {
            Ok(record) => {
                accumulator.lock().record_success(index, record);
            }
            Err(failure) => {
                debug!(worker, index, failure = %failure, "Item fetch failed");
                match recover(fetcher.as_ref(), index, &failure, item_timeout).await {
                    Ok(Some(mut record)) => {
                        record.mark_missing(failure.to_string());
                        accumulator.lock().record_degraded(index, record);
                    }
                    Ok(None) => {
                        let id = describe(fetcher.as_ref(), index);
                        accumulator.lock().record_failure(index, id, failure);
                    }
                    Err(panicked) => {
                        warn!(worker, index, failure = %panicked, "Fallback panicked");
                        let id = describe(fetcher.as_ref(), index);
                        accumulator.lock().record_failure(index, id, panicked);
                    }
                }
            }
        }
    }

    WorkerExit::Finished(session)
}

async fn attempt<F: ItemFetcher>(
    fetcher: &F,
    session: &mut F::Session,
    index: usize,
    item_timeout: Option<Duration>,
) -> Result<crate::core::Record, ItemFailure> {
    let call = AssertUnwindSafe(fetcher.fetch(session, index)).catch_unwind();
    let caught = match item_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(caught) => caught,
            Err(_) => {
                return Err(ItemFailure::Timeout {
                    after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }
        },
        None => call.await,
    };
    caught.unwrap_or_else(|payload| Err(ItemFailure::Panicked(panic_message(payload.as_ref()))))
}

/// Asks the fetcher for a fallback once. A fallback that panics fails the
/// item; one that outlives `item_timeout` counts as no fallback.
async fn recover<F: ItemFetcher>(
    fetcher: &F,
    index: usize,
    failure: &ItemFailure,
    item_timeout: Option<Duration>,
) -> Result<Option<crate::core::Record>, ItemFailure> {
    let call = AssertUnwindSafe(fetcher.fallback(index, failure)).catch_unwind();
    let caught = match item_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(caught) => caught,
            Err(_) => return Ok(None),
        },
        None => call.await,
    };
    caught.map_err(|payload| ItemFailure::Panicked(panic_message(payload.as_ref())))
}

fn describe<F: ItemFetcher>(fetcher: &F, index: usize) -> String {
    std::panic::catch_unwind(AssertUnwindSafe(|| fetcher.describe(index)))
        .unwrap_or_else(|_| format!("item {index}"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
