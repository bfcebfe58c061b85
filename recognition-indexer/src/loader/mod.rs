//! Loader module for the recognition indexer ingest.
//!
//! Writes recognition documents into the document store with a single bulk upsert
//! per batch.

use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::errors::IngestError;
use recognition_indexer_repository::{BulkUpsertSummary, DocumentStore};
use recognition_indexer_shared::RecognitionDocument;

/// Loader that persists documents into the document store.
///
/// A batch counts as loaded only when every document was accepted. Partial
/// failures are reported as errors so the caller never commits offsets for
/// documents that were not written.
#[derive(Clone)]
pub struct RecognitionLoader {
    store: Arc<dyn DocumentStore>,
}

impl RecognitionLoader {
    /// Create a new loader backed by the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Upsert every document, keyed by `uniqueId`.
    ///
    /// An empty slice is a no-op and does not reach the store.
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    pub async fn load(
        &self,
        documents: &[RecognitionDocument],
    ) -> Result<BulkUpsertSummary, IngestError> {
        if documents.is_empty() {
            debug!("No documents to load");
            return Ok(BulkUpsertSummary::default());
        }

        let count = documents.len();
        let summary = self.store.upsert_all(documents).await.map_err(|e| {
            error!(error = %e, count = count, "Failed to bulk upsert documents");
            IngestError::loader(format!("Failed to bulk upsert {} documents: {}", count, e))
        })?;

        if summary.failed > 0 {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk upsert completed with some failures"
            );
            for result in summary.results.iter().filter(|r| !r.success) {
                if let Some(ref err) = result.error {
                    error!(
                        unique_id = %result.unique_id,
                        error = %err,
                        "Failed to upsert document"
                    );
                }
            }
            return Err(IngestError::loader(format!(
                "{} of {} documents failed to upsert",
                summary.failed, summary.total
            )));
        }

        debug!(count = summary.succeeded, "Successfully upserted all documents");
        Ok(summary)
    }
}
