//! Recognition processor implementation.
//!
//! Turns a decoded batch of recognition events into documents ready for loading.

use tracing::{debug, instrument};

use super::dedup::deduplicate;
use recognition_indexer_shared::{RecognitionDocument, RecognitionEvent};

/// Result of processing one batch of events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedBatch {
    /// Number of events handed to the processor.
    pub received: usize,
    /// Number of events dropped because their `uniqueId` repeated within the batch.
    pub duplicates_dropped: usize,
    /// One document per distinct `uniqueId`, in first-seen order.
    pub documents: Vec<RecognitionDocument>,
}

/// Processor that deduplicates events and maps them to documents.
#[derive(Debug, Default, Clone)]
pub struct RecognitionProcessor;

impl RecognitionProcessor {
    /// Create a new recognition processor.
    pub fn new() -> Self {
        Self
    }

    /// Process a batch of recognition events.
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    pub fn process_batch(&self, events: Vec<RecognitionEvent>) -> ProcessedBatch {
        let received = events.len();
        let unique = deduplicate(events);
        let duplicates_dropped = received - unique.len();

        let documents: Vec<RecognitionDocument> =
            unique.into_iter().map(RecognitionDocument::from).collect();

        debug!(
            received = received,
            duplicates_dropped = duplicates_dropped,
            document_count = documents.len(),
            "Processed event batch"
        );

        ProcessedBatch {
            received,
            duplicates_dropped,
            documents,
        }
    }
}
