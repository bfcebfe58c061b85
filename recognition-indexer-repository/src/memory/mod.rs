//! In-memory implementation of the document store.
//!
//! Keeps documents in a map keyed by `uniqueId` with the same upsert and
//! bootstrap semantics as the OpenSearch provider. Used for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use recognition_indexer_shared::RecognitionDocument;
use serde_json::Value;
use tracing::debug;

use crate::errors::SearchIndexError;
use crate::interfaces::DocumentStore;
use crate::opensearch::{get_index_settings, IndexConfig};
use crate::types::{BulkUpsertSummary, EnsureIndexOutcome, UpsertResult};

/// Document store backed by a `HashMap`.
///
/// `set_unavailable(true)` makes every call fail with `SearchIndexError::Unavailable`,
/// which simulates a store outage.
pub struct InMemoryDocumentStore {
    index_config: IndexConfig,
    mapping: Mutex<Option<Value>>,
    documents: Mutex<HashMap<String, RecognitionDocument>>,
    index_creations: AtomicUsize,
    upsert_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_index_config(IndexConfig::default())
    }

    pub fn with_index_config(index_config: IndexConfig) -> Self {
        Self {
            index_config,
            mapping: Mutex::new(None),
            documents: Mutex::new(HashMap::new()),
            index_creations: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggle simulated outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Look up a document by its `uniqueId`.
    pub fn get(&self, unique_id: &str) -> Option<RecognitionDocument> {
        self.lock_documents().get(unique_id).cloned()
    }

    /// All stored documents, sorted by `uniqueId`.
    pub fn documents(&self) -> Vec<RecognitionDocument> {
        let mut docs: Vec<RecognitionDocument> = self.lock_documents().values().cloned().collect();
        docs.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        docs
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock_documents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The mapping the index was created with, if it has been created.
    pub fn mapping(&self) -> Option<Value> {
        self.mapping
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// How many times the index was actually created.
    pub fn index_creations(&self) -> usize {
        self.index_creations.load(Ordering::SeqCst)
    }

    /// How many times `upsert_all` reached the store, empty calls included.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    fn lock_documents(&self) -> std::sync::MutexGuard<'_, HashMap<String, RecognitionDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), SearchIndexError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SearchIndexError::unavailable(format!(
                "index {} is not reachable",
                self.index_config.name
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn ensure_index(&self) -> Result<EnsureIndexOutcome, SearchIndexError> {
        self.check_available()?;

        let mut mapping = self
            .mapping
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if mapping.is_some() {
            return Ok(EnsureIndexOutcome::AlreadyExists);
        }

        *mapping = Some(get_index_settings(&self.index_config));
        self.index_creations.fetch_add(1, Ordering::SeqCst);
        debug!(index = %self.index_config.name, "Created in-memory index");
        Ok(EnsureIndexOutcome::Created)
    }

    async fn upsert_all(
        &self,
        documents: &[RecognitionDocument],
    ) -> Result<BulkUpsertSummary, SearchIndexError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut stored = self.lock_documents();
        let results = documents
            .iter()
            .map(|doc| {
                stored.insert(doc.document_id().to_string(), doc.clone());
                UpsertResult::succeeded(doc.document_id())
            })
            .collect();

        Ok(BulkUpsertSummary::from_results(results))
    }
}
