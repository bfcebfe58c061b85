//! Document store trait definition.

use async_trait::async_trait;
use recognition_indexer_shared::RecognitionDocument;

use crate::errors::SearchIndexError;
use crate::types::{BulkUpsertSummary, EnsureIndexOutcome};

/// Abstracts the underlying search index implementation (OpenSearch, in-memory, etc.).
///
/// Implementations must tolerate concurrent calls from several pipeline workers.
/// Writes are keyed by `uniqueId`, so concurrent upserts of different ids are
/// independent and upserts of the same id resolve as last-write-wins.
///
/// # Index Initialization
///
/// `ensure_index` is called once during application startup, before any document
/// is written. It must be safe to run concurrently from several processes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ensure the target index exists with the recognition mapping, creating it if necessary.
    ///
    /// # Returns
    ///
    /// * `Ok(EnsureIndexOutcome::Created)` - If this call created the index
    /// * `Ok(EnsureIndexOutcome::AlreadyExists)` - If the index was already there,
    ///   including when another instance created it concurrently
    /// * `Err(SearchIndexError)` - If the index could not be checked or created
    async fn ensure_index(&self) -> Result<EnsureIndexOutcome, SearchIndexError>;

    /// Insert or replace every document, keyed by its `uniqueId`.
    ///
    /// Writing the same document twice leaves the store in the same state as writing
    /// it once. An empty slice is a no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkUpsertSummary)` - Aggregate statistics and per-document results
    /// * `Err(SearchIndexError)` - If the bulk request fails entirely
    async fn upsert_all(
        &self,
        documents: &[RecognitionDocument],
    ) -> Result<BulkUpsertSummary, SearchIndexError>;
}
