//! Consumer module for the recognition indexer ingest.
//!
//! Provides the broker consumer port, its Kafka implementation and the event decoder.

mod decoder;
mod kafka_consumer;
mod messages;

pub use decoder::{AvroEventDecoder, EventDecoder, WireFormat, RECOGNITION_EVENT_SCHEMA};
pub use kafka_consumer::{KafkaConsumer, KafkaConsumerConfig, RECOGNITIONS_TOPIC};
pub use messages::{MessageBatch, RawMessage};

use async_trait::async_trait;

use crate::errors::IngestError;

/// Source of message batches with explicit offset control.
///
/// Implementations deliver one batch at a time. The orchestrator calls `commit`
/// only after the batch has been persisted; after a failure it calls `rewind`
/// so that the same records are delivered again by a later `poll_batch`.
#[async_trait]
pub trait BatchConsumer: Send + Sync {
    /// Subscribe to the configured topics.
    fn subscribe(&self) -> Result<(), IngestError>;

    /// Wait for the next batch.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(batch))` - The next batch, possibly empty if the poll timed out
    /// * `Ok(None)` - The stream has ended
    /// * `Err(IngestError)` - The broker reported an error
    async fn poll_batch(&self) -> Result<Option<MessageBatch>, IngestError>;

    /// Synchronously commit the offsets of a fully persisted batch.
    async fn commit(&self, batch: &MessageBatch) -> Result<(), IngestError>;

    /// Arrange for an uncommitted batch to be delivered again.
    async fn rewind(&self, batch: &MessageBatch) -> Result<(), IngestError>;
}
