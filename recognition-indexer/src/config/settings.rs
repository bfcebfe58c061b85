//! Runtime settings read from environment variables.

use std::env;
use std::time::Duration;
use tracing::warn;

use crate::consumer::{KafkaConsumerConfig, RECOGNITIONS_TOPIC};
use crate::IndexingError;
use recognition_indexer_repository::opensearch::{IndexConfig, INDEX_NAME};

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "recognition-connector";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

const DEFAULT_INDEX_SHARDS: u32 = 3;
const DEFAULT_INDEX_REPLICAS: u32 = 1;
const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;
const DEFAULT_REDELIVERY_BACKOFF_MS: u64 = 1000;
const DEFAULT_CONSUMER_WORKERS: usize = 1;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection at a fixed interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Everything the indexer needs to know to start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch_url: String,
    pub index_config: IndexConfig,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub kafka: KafkaConsumerConfig,
    /// Number of consumer workers in this process.
    pub consumer_workers: usize,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_NAME`: Index name (default: "recognitions")
    /// - `INDEX_SHARDS` / `INDEX_REPLICAS`: Shard layout for a new index (default: 3 / 1)
    /// - `OPENSEARCH_CONNECTION_MODE`: Connection mode - "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: recognition-connector)
    /// - `KAFKA_TOPIC`: Topic to consume (default: recognitions)
    /// - `KAFKA_BATCH_SIZE`: Maximum records per batch (default: 500)
    /// - `KAFKA_BATCH_TIMEOUT_MS`: Maximum wait for a batch (default: 1000)
    /// - `KAFKA_REDELIVERY_BACKOFF_MS`: Pause after rewinding a failed batch (default: 1000)
    /// - `KAFKA_CONSUMER_WORKERS`: Number of consumer workers (default: 1)
    /// - `KAFKA_USERNAME` / `KAFKA_PASSWORD`: SASL credentials (optional)
    /// - `KAFKA_SSL_CA_PEM`: Custom CA certificate (optional)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let index_config = IndexConfig::new(text("INDEX_NAME", INDEX_NAME)).with_shards(
            parse_or(&lookup, "INDEX_SHARDS", DEFAULT_INDEX_SHARDS)?,
            parse_or(&lookup, "INDEX_REPLICAS", DEFAULT_INDEX_REPLICAS)?,
        );

        let batch_size: usize = parse_or(&lookup, "KAFKA_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(IndexingError::config("KAFKA_BATCH_SIZE must be at least 1"));
        }
        let batch_timeout = Duration::from_millis(parse_or(
            &lookup,
            "KAFKA_BATCH_TIMEOUT_MS",
            DEFAULT_BATCH_TIMEOUT_MS,
        )?);
        let redelivery_backoff = Duration::from_millis(parse_or(
            &lookup,
            "KAFKA_REDELIVERY_BACKOFF_MS",
            DEFAULT_REDELIVERY_BACKOFF_MS,
        )?);

        let mut kafka = KafkaConsumerConfig::new(text("KAFKA_BROKER", DEFAULT_KAFKA_BROKER))
            .with_group_id(text("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID))
            .with_topic(text("KAFKA_TOPIC", RECOGNITIONS_TOPIC))
            .with_batching(batch_size, batch_timeout)
            .with_redelivery_backoff(redelivery_backoff);

        match (lookup("KAFKA_USERNAME"), lookup("KAFKA_PASSWORD")) {
            (Some(username), Some(password)) => {
                kafka = kafka.with_credentials(username, password);
            }
            (Some(_), None) => {
                return Err(IndexingError::config(
                    "KAFKA_PASSWORD is required when KAFKA_USERNAME is set",
                ));
            }
            _ => {}
        }
        if let Some(ca_pem) = lookup("KAFKA_SSL_CA_PEM") {
            kafka = kafka.with_ssl_ca(ca_pem);
        }

        let consumer_workers: usize =
            parse_or(&lookup, "KAFKA_CONSUMER_WORKERS", DEFAULT_CONSUMER_WORKERS)?;
        if consumer_workers == 0 {
            return Err(IndexingError::config(
                "KAFKA_CONSUMER_WORKERS must be at least 1",
            ));
        }

        Ok(Self {
            opensearch_url: text("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            index_config,
            connection_mode: ConnectionMode::parse(lookup("OPENSEARCH_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(parse_or(
                &lookup,
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )?),
            kafka,
            consumer_workers,
        })
    }
}

/// Parse a numeric variable, falling back to `default` when it is unset.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, IndexingError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| IndexingError::config(format!("Invalid {}={:?}: {}", key, raw, e))),
    }
}
