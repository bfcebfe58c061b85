//! Dependency initialization and wiring for the recognition indexer.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::settings::{ConnectionMode, Settings};
use crate::bootstrap::bootstrap_index;
use crate::consumer::{AvroEventDecoder, BatchConsumer, EventDecoder, KafkaConsumer};
use crate::loader::RecognitionLoader;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::processor::RecognitionProcessor;
use crate::IndexingError;
use recognition_indexer_repository::opensearch::IndexConfig;
use recognition_indexer_repository::{DocumentStore, OpenSearchProvider};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// One orchestrator per consumer worker, all sharing the same store.
    pub orchestrators: Vec<Orchestrator>,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`Settings::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If configuration is invalid, OpenSearch is unreachable in
    ///   fail-fast mode, or the index bootstrap fails
    pub async fn new() -> Result<Self, IndexingError> {
        let settings = Settings::from_env()?;
        Self::from_settings(&settings).await
    }

    /// Initialize all dependencies from explicit settings.
    pub async fn from_settings(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index = %settings.index_config.name,
            kafka_broker = %settings.kafka.brokers,
            kafka_group_id = %settings.kafka.group_id,
            kafka_topic = %settings.kafka.topic,
            consumer_workers = settings.consumer_workers,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let provider = Self::connect_to_opensearch(
            &settings.opensearch_url,
            settings.index_config.clone(),
            settings.connection_mode,
            settings.retry_interval,
        )
        .await?;

        info!("OpenSearch connection established");

        let store: Arc<dyn DocumentStore> = Arc::new(provider);

        // Runs once per process; workers never re-check the index
        bootstrap_index(store.as_ref()).await?;

        let decoder: Arc<dyn EventDecoder> = Arc::new(
            AvroEventDecoder::new()
                .map_err(|e| IndexingError::config(format!("Invalid event schema: {}", e)))?,
        );

        let mut orchestrators = Vec::with_capacity(settings.consumer_workers);
        for worker_id in 0..settings.consumer_workers {
            // Same group for every worker, so Kafka assigns each a disjoint set of partitions
            let consumer: Arc<dyn BatchConsumer> =
                Arc::new(KafkaConsumer::new(&settings.kafka).map_err(|e| {
                    IndexingError::config(format!("Failed to create Kafka consumer: {}", e))
                })?);

            orchestrators.push(Orchestrator::with_config(
                consumer,
                decoder.clone(),
                RecognitionProcessor::new(),
                RecognitionLoader::new(store.clone()),
                OrchestratorConfig {
                    worker_id,
                    poll_error_backoff: settings.kafka.redelivery_backoff,
                    ..OrchestratorConfig::default()
                },
            ));
        }

        info!(worker_count = orchestrators.len(), "Kafka consumers created");

        Ok(Self { orchestrators })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        index_config: IndexConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, IndexingError> {
        loop {
            match Self::try_connect_opensearch(url, index_config.clone()).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Create the provider and check the cluster answers.
    async fn try_connect_opensearch(
        url: &str,
        index_config: IndexConfig,
    ) -> Result<OpenSearchProvider, IndexingError> {
        let provider = OpenSearchProvider::new(url, index_config)
            .await
            .map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch provider: {}", e))
            })?;

        provider
            .ping()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch ping failed: {}", e)))?;

        Ok(provider)
    }
}
