//! Batch-local deduplication of recognition events.

use std::collections::HashSet;

use recognition_indexer_shared::RecognitionEvent;

/// Remove events whose `uniqueId` already appeared earlier in the batch.
///
/// The first occurrence of every id is kept and the relative order of the
/// survivors is preserved. Duplicates across batches are not detected here;
/// the store absorbs them because writes are keyed by `uniqueId`.
pub fn deduplicate(events: Vec<RecognitionEvent>) -> Vec<RecognitionEvent> {
    let mut seen = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|event| seen.insert(event.unique_id.clone()))
        .collect()
}
