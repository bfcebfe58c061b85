//! Kafka consumer implementation for the recognition indexer.
//!
//! Polls recognition records from Kafka in batches and commits their offsets
//! only when told to by the orchestrator.

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message as KafkaMessage,
    Offset, TopicPartitionList,
};
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::messages::{MessageBatch, RawMessage};
use crate::consumer::BatchConsumer;
use crate::errors::IngestError;

/// The Kafka topic carrying recognition events.
pub const RECOGNITIONS_TOPIC: &str = "recognitions";

/// Default consumer group ID.
const DEFAULT_GROUP_ID: &str = "recognition-connector";

/// Default maximum number of records per batch.
const DEFAULT_BATCH_SIZE: usize = 500;

/// Default time to wait for a batch to fill, in milliseconds.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

/// Default pause after rewinding a failed batch, in milliseconds.
const DEFAULT_REDELIVERY_BACKOFF_MS: u64 = 1000;

/// Timeout for seeking a partition back to a batch's first offset.
const SEEK_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for creating a Kafka consumer.
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    /// Kafka broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topic to subscribe to
    pub topic: String,
    /// Maximum number of records per batch
    pub batch_size: usize,
    /// Maximum time to wait for a batch to fill
    pub batch_timeout: Duration,
    /// Pause after rewinding a failed batch before polling again
    pub redelivery_backoff: Duration,
    /// SASL username (enables SASL/SSL if set)
    pub username: Option<String>,
    /// SASL password (required if username is set)
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
}

impl KafkaConsumerConfig {
    /// Create a config with default topic, batching and no credentials.
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            topic: RECOGNITIONS_TOPIC.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: Duration::from_millis(DEFAULT_BATCH_TIMEOUT_MS),
            redelivery_backoff: Duration::from_millis(DEFAULT_REDELIVERY_BACKOFF_MS),
            username: None,
            password: None,
            ssl_ca_pem: None,
        }
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_batching(mut self, batch_size: usize, batch_timeout: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_timeout = batch_timeout;
        self
    }

    pub fn with_redelivery_backoff(mut self, backoff: Duration) -> Self {
        self.redelivery_backoff = backoff;
        self
    }

    /// Set SASL credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Set custom CA certificate.
    pub fn with_ssl_ca(mut self, ca_pem: String) -> Self {
        self.ssl_ca_pem = Some(ca_pem);
        self
    }

    /// Build the librdkafka client configuration.
    ///
    /// Auto-commit is disabled: offsets only move when a batch has been persisted.
    fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000");

        // SASL/SSL for managed Kafka, plaintext otherwise
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);

            if let Some(ca_pem) = &self.ssl_ca_pem {
                client_config.set("ssl.ca.pem", ca_pem);
            }
        }

        client_config
    }
}

/// Kafka consumer for recognition events.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topic: String,
    batch_size: usize,
    batch_timeout: Duration,
    redelivery_backoff: Duration,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaConsumer)` - A new consumer instance
    /// * `Err(IngestError)` - If consumer creation fails
    pub fn new(config: &KafkaConsumerConfig) -> Result<Self, IngestError> {
        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            topic = %config.topic,
            batch_size = config.batch_size,
            batch_timeout_ms = config.batch_timeout.as_millis() as u64,
            "Created Kafka consumer with batching"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
            batch_size: config.batch_size,
            batch_timeout: config.batch_timeout,
            redelivery_backoff: config.redelivery_backoff,
        })
    }

    fn to_raw_message(msg: &rdkafka::message::BorrowedMessage<'_>) -> RawMessage {
        RawMessage {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(<[u8]>::to_vec),
            payload: msg.payload().map(<[u8]>::to_vec),
        }
    }
}

#[async_trait]
impl BatchConsumer for KafkaConsumer {
    /// Subscribe to the recognitions topic.
    fn subscribe(&self) -> Result<(), IngestError> {
        self.consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(topic = %self.topic, "Subscribed to Kafka topic");
        Ok(())
    }

    /// Collect up to `batch_size` records or whatever arrives within `batch_timeout`.
    async fn poll_batch(&self) -> Result<Option<MessageBatch>, IngestError> {
        let deadline = Instant::now() + self.batch_timeout;
        let mut messages = Vec::with_capacity(self.batch_size);

        while messages.len() < self.batch_size {
            match timeout_at(deadline, self.consumer.recv()).await {
                Err(_) => break,
                Ok(Ok(msg)) => {
                    debug!(
                        topic = %msg.topic(),
                        partition = msg.partition(),
                        offset = msg.offset(),
                        "Received message from Kafka"
                    );
                    messages.push(Self::to_raw_message(&msg));
                }
                Ok(Err(e)) if messages.is_empty() => {
                    error!(error = %e, "Kafka error");
                    return Err(e.into());
                }
                Ok(Err(e)) => {
                    // Deliver what we have; the error resurfaces on the next poll if it persists
                    warn!(error = %e, count = messages.len(), "Kafka error, flushing partial batch");
                    break;
                }
            }
        }

        Ok(Some(MessageBatch::new(messages)))
    }

    /// Commit the next offset of every partition in the batch.
    #[instrument(skip(self, batch), fields(message_count = batch.len()))]
    async fn commit(&self, batch: &MessageBatch) -> Result<(), IngestError> {
        let offsets = batch.commit_offsets();
        if offsets.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (topic, partition, offset) in &offsets {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(*offset))
                .map_err(|e| IngestError::kafka(e.to_string()))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        debug!(partition_count = offsets.len(), "Committed offsets");
        Ok(())
    }

    /// Seek every partition of the batch back to its first offset, then back off.
    #[instrument(skip(self, batch), fields(message_count = batch.len()))]
    async fn rewind(&self, batch: &MessageBatch) -> Result<(), IngestError> {
        for (topic, partition, offset) in batch.rewind_offsets() {
            self.consumer
                .seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
                .map_err(|e| IngestError::kafka(e.to_string()))?;

            info!(
                topic = %topic,
                partition = partition,
                offset = offset,
                "Rewound partition for redelivery"
            );
        }

        sleep(self.redelivery_backoff).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(RECOGNITIONS_TOPIC, "recognitions");
        assert_eq!(DEFAULT_GROUP_ID, "recognition-connector");
        assert_eq!(DEFAULT_BATCH_SIZE, 500);
        assert_eq!(DEFAULT_BATCH_TIMEOUT_MS, 1000);
    }

    #[test]
    fn test_client_config_disables_auto_commit() {
        let config = KafkaConsumerConfig::new("localhost:9092").with_group_id("group-a");
        let client_config = config.client_config();

        assert_eq!(client_config.get("enable.auto.commit"), Some("false"));
        assert_eq!(client_config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(client_config.get("group.id"), Some("group-a"));
        assert_eq!(client_config.get("security.protocol"), None);
    }

    #[test]
    fn test_client_config_with_credentials() {
        let config = KafkaConsumerConfig::new("broker:9093")
            .with_credentials("user".to_string(), "secret".to_string())
            .with_ssl_ca("pem".to_string());
        let client_config = config.client_config();

        assert_eq!(client_config.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(client_config.get("sasl.username"), Some("user"));
        assert_eq!(client_config.get("ssl.ca.pem"), Some("pem"));
    }

    #[test]
    fn test_batch_size_is_at_least_one() {
        let config = KafkaConsumerConfig::new("localhost:9092")
            .with_batching(0, Duration::from_millis(10));
        assert_eq!(config.batch_size, 1);
    }
}
