//! Stage collaborators.
//!
//! A pipeline stage is one of three transforms: a [`RecordSource`] that
//! produces the first artifact, a [`RecordFilter`] that keeps or drops each
//! input record, or a [`RecordFetcher`] that enriches each input record
//! through the batch fetch engine. The generic collaborators in this module
//! cover the screener's listing, bounds and exclusion steps; domain
//! predicates plug in through the same traits.

mod bounds;
mod exclusion;
#[cfg(feature = "http")]
mod listing;
#[cfg(feature = "http")]
mod lookup;

pub use bounds::FieldBounds;
pub use exclusion::SymbolExclusion;
#[cfg(feature = "http")]
pub use listing::HttpListingSource;
#[cfg(feature = "http")]
pub use lookup::HttpFieldFetcher;

use crate::core::Record;
use crate::errors::{ItemFailure, ScreenflowError};
use async_trait::async_trait;
use std::fmt;

/// Produces the records of a pipeline's first stage.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Produces all records for `stage`.
    ///
    /// # Errors
    ///
    /// A source that cannot produce its records fails the run, usually with
    /// [`ScreenflowError::Source`].
    async fn produce(&self, stage: &str) -> Result<Vec<Record>, ScreenflowError>;
}

/// Keeps, drops or fails each record of a filter stage.
///
/// `Ok(None)` means "filtered out"; an `Err` counts the record as failed.
pub trait RecordFilter: Send + Sync {
    /// Applies the filter to one record.
    fn apply(&self, record: Record) -> Result<Option<Record>, ItemFailure>;
}

/// Enriches each record of a fetch stage from an external source.
///
/// Runs on the batch fetch engine: every worker opens one session and
/// reuses it for all the records it handles.
#[async_trait]
pub trait RecordFetcher: Send + Sync + 'static {
    /// Worker-local resource reused across records.
    type Session: Send + 'static;

    /// Opens the session for `worker`.
    async fn open_session(&self, worker: usize) -> Result<Self::Session, ItemFailure>;

    /// Produces the enriched record for `record`.
    async fn fetch(&self, session: &mut Self::Session, record: &Record)
        -> Result<Record, ItemFailure>;

    /// Offers a record to keep after `fetch` failed; it will be flagged as
    /// missing data.
    async fn fallback(&self, _record: &Record, _failure: &ItemFailure) -> Option<Record> {
        None
    }

    /// Releases a session.
    fn close_session(&self, _worker: usize, _session: Self::Session) {}
}

/// A source backed by a closure.
pub struct FnSource<F>
where
    F: Fn() -> Result<Vec<Record>, ScreenflowError> + Send + Sync,
{
    func: F,
}

impl<F> FnSource<F>
where
    F: Fn() -> Result<Vec<Record>, ScreenflowError> + Send + Sync,
{
    /// Creates a closure-backed source.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl FnSource<Box<dyn Fn() -> Result<Vec<Record>, ScreenflowError> + Send + Sync>> {
    /// Creates a source that always yields `records`.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        Self::new(Box::new(move || Ok(records.clone())))
    }
}

impl<F> fmt::Debug for FnSource<F>
where
    F: Fn() -> Result<Vec<Record>, ScreenflowError> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> RecordSource for FnSource<F>
where
    F: Fn() -> Result<Vec<Record>, ScreenflowError> + Send + Sync,
{
    async fn produce(&self, _stage: &str) -> Result<Vec<Record>, ScreenflowError> {
        (self.func)()
    }
}

/// A filter backed by a closure.
pub struct FnFilter<F>
where
    F: Fn(Record) -> Result<Option<Record>, ItemFailure> + Send + Sync,
{
    func: F,
}

impl<F> FnFilter<F>
where
    F: Fn(Record) -> Result<Option<Record>, ItemFailure> + Send + Sync,
{
    /// Creates a closure-backed filter.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnFilter<F>
where
    F: Fn(Record) -> Result<Option<Record>, ItemFailure> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter").finish_non_exhaustive()
    }
}

impl<F> RecordFilter for FnFilter<F>
where
    F: Fn(Record) -> Result<Option<Record>, ItemFailure> + Send + Sync,
{
    fn apply(&self, record: Record) -> Result<Option<Record>, ItemFailure> {
        (self.func)(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_source() {
        let source = FnSource::new(|| Ok(vec![Record::for_symbol("A")]));
        let records = source.produce("listing").await.unwrap();
        assert_eq!(records.len(), 1);

        let fixed = FnSource::from_records(vec![Record::for_symbol("B"), Record::for_symbol("C")]);
        assert_eq!(fixed.produce("listing").await.unwrap().len(), 2);
        assert_eq!(fixed.produce("listing").await.unwrap().len(), 2);
    }

    #[test]
    fn test_fn_filter() {
        let filter = FnFilter::new(|record: Record| match record.symbol() {
            Some("Y") => Ok(None),
            Some(_) => Ok(Some(record)),
            None => Err(ItemFailure::MissingData("no symbol".into())),
        });

        assert!(filter.apply(Record::for_symbol("X")).unwrap().is_some());
        assert!(filter.apply(Record::for_symbol("Y")).unwrap().is_none());
        assert!(filter.apply(Record::new()).is_err());
    }
}
