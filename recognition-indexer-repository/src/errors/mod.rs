//! Error types for the recognition indexer repository.
//!
//! This module provides a unified error type for all document store operations.

mod search_index_error;

pub use search_index_error::SearchIndexError;
