//! Interface definitions for the document store.
//!
//! This module defines the abstract `DocumentStore` trait so the ingestion pipeline
//! can be wired to OpenSearch in production and to an in-memory store in tests.

mod document_store;

pub use document_store::DocumentStore;
