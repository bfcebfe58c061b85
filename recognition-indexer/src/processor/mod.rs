//! Processor module for the recognition indexer ingest.
//!
//! Deduplicates recognition events and maps them to documents.

mod dedup;
mod recognition_processor;

pub use dedup::deduplicate;
pub use recognition_processor::{ProcessedBatch, RecognitionProcessor};
