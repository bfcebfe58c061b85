//! One-time index bootstrap, run before any worker starts consuming.

use tracing::{error, info, instrument};

use crate::IndexingError;
use recognition_indexer_repository::{DocumentStore, EnsureIndexOutcome};

/// Make sure the recognitions index exists with its mapping.
///
/// An index that already exists, including one created concurrently by another
/// instance, counts as success. Any other failure is fatal: ingestion must not
/// start against a missing or unmapped index.
#[instrument(skip(store))]
pub async fn bootstrap_index(store: &dyn DocumentStore) -> Result<EnsureIndexOutcome, IndexingError> {
    match store.ensure_index().await {
        Ok(EnsureIndexOutcome::Created) => {
            info!("Created recognitions index");
            Ok(EnsureIndexOutcome::Created)
        }
        Ok(EnsureIndexOutcome::AlreadyExists) => {
            info!("Recognitions index already exists, skipping creation");
            Ok(EnsureIndexOutcome::AlreadyExists)
        }
        Err(e) => {
            error!(error = %e, "Failed to bootstrap recognitions index");
            Err(IndexingError::bootstrap(format!(
                "Failed to ensure index exists: {}",
                e
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recognition_indexer_repository::InMemoryDocumentStore;

    #[tokio::test]
    async fn test_bootstrap_twice_creates_once() {
        let store = InMemoryDocumentStore::new();

        let first = bootstrap_index(&store).await.unwrap();
        let second = bootstrap_index(&store).await.unwrap();

        assert_eq!(first, EnsureIndexOutcome::Created);
        assert_eq!(second, EnsureIndexOutcome::AlreadyExists);
        assert_eq!(store.index_creations(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_fatal() {
        let store = InMemoryDocumentStore::new();
        store.set_unavailable(true);

        let result = bootstrap_index(&store).await;

        assert!(matches!(result, Err(IndexingError::BootstrapError(_))));
        assert_eq!(store.index_creations(), 0);
    }
}
