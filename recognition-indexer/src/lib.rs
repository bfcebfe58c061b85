//! # Recognition Indexer
//!
//! Consumes recognition events from Kafka and indexes them into OpenSearch.
//!
//! ## Architecture
//!
//! The indexer follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Polls batches of raw messages from Kafka and decodes them
//! 2. **Processor**: Deduplicates events by `uniqueId` and maps them to documents
//! 3. **Loader**: Bulk-upserts documents into the document store
//! 4. **Orchestrator**: Runs the poll/process/commit loop for one worker
//!
//! Offsets are committed only after the store accepted the whole batch. A failed
//! batch is rewound and redelivered; writes are keyed by `uniqueId`, so
//! reprocessing it is safe.
//!
//! ## Modules
//!
//! - [`bootstrap`]: One-time index bootstrap at startup
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: Kafka consumer and event decoder
//! - [`processor`]: Deduplication and document mapping
//! - [`loader`]: Writes documents into the store
//! - [`orchestrator`]: Coordinates the ingest flow
//! - [`errors`]: Error types for the indexer

pub mod bootstrap;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;

pub use config::{Dependencies, Settings};
pub use errors::IngestError;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Index bootstrap failed; ingestion must not start.
    #[error("Bootstrap error: {0}")]
    BootstrapError(String),

    /// A pipeline worker task failed to complete.
    #[error("Worker error: {0}")]
    WorkerError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a bootstrap error.
    pub fn bootstrap(msg: impl Into<String>) -> Self {
        Self::BootstrapError(msg.into())
    }

    /// Create a worker error.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::WorkerError(msg.into())
    }
}
