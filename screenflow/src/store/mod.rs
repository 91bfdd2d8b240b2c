//! Persisted pipeline state: stage artifacts and the cache ledger.

mod artifact_store;
mod file;
mod ledger;

#[cfg(test)]
pub use artifact_store::MockArtifactStore;
pub use artifact_store::{ArtifactStore, InMemoryArtifactStore};
pub use file::FileArtifactStore;
pub use ledger::{CacheLedger, LedgerEntry, ResetReason};
