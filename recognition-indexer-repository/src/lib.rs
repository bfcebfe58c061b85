//! # Recognition Indexer Repository
//!
//! This crate provides the document store port used by the recognition indexer and
//! its implementations. It includes definitions for errors, the `DocumentStore`
//! interface, a concrete implementation for OpenSearch and an in-memory store.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use errors::SearchIndexError;
pub use interfaces::DocumentStore;
pub use memory::InMemoryDocumentStore;
pub use opensearch::{IndexConfig, OpenSearchProvider};
pub use types::{BulkUpsertSummary, EnsureIndexOutcome, UpsertResult};
