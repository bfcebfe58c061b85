//! Orchestrator module for the recognition indexer ingest.
//!
//! Runs the poll → decode → dedup → map → upsert → commit loop for one worker.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{BatchConsumer, EventDecoder, MessageBatch};
use crate::errors::IngestError;
use crate::loader::RecognitionLoader;
use crate::processor::RecognitionProcessor;
use recognition_indexer_shared::RecognitionEvent;

/// The states a batch moves through: `Received → Deduplicated → Mapped →
/// Persisted → Acknowledged`, or `Failed` from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Received,
    Deduplicated,
    Mapped,
    Persisted,
    Acknowledged,
    Failed,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStage::Received => "received",
            BatchStage::Deduplicated => "deduplicated",
            BatchStage::Mapped => "mapped",
            BatchStage::Persisted => "persisted",
            BatchStage::Acknowledged => "acknowledged",
            BatchStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum time between two progress log lines.
    pub progress_interval: Duration,
    /// Identifies the worker in logs when several run in one process.
    pub worker_id: usize,
    /// Pause before polling again after the consumer reported an error.
    pub poll_error_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_secs(10),
            worker_id: 0,
            poll_error_backoff: Duration::from_secs(1),
        }
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Raw messages in the batch.
    pub messages: usize,
    /// Messages decoded into events.
    pub decoded: usize,
    /// Messages dropped because they could not be decoded.
    pub decode_failures: usize,
    /// Events dropped because their `uniqueId` repeated within the batch.
    pub duplicates_dropped: usize,
    /// Documents upserted into the store.
    pub documents_indexed: usize,
}

/// Snapshot of the counters an orchestrator keeps since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub batches_committed: u64,
    pub batches_failed: u64,
    pub events_processed: u64,
    pub decode_failures: u64,
    pub duplicates_dropped: u64,
    pub documents_indexed: u64,
}

#[derive(Default)]
struct Counters {
    batches_committed: AtomicU64,
    batches_failed: AtomicU64,
    events_processed: AtomicU64,
    decode_failures: AtomicU64,
    duplicates_dropped: AtomicU64,
    documents_indexed: AtomicU64,
}

impl Counters {
    fn record(&self, report: &BatchReport) {
        self.events_processed
            .fetch_add(report.decoded as u64, Ordering::Relaxed);
        self.decode_failures
            .fetch_add(report.decode_failures as u64, Ordering::Relaxed);
        self.duplicates_dropped
            .fetch_add(report.duplicates_dropped as u64, Ordering::Relaxed);
        self.documents_indexed
            .fetch_add(report.documents_indexed as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> OrchestratorStats {
        OrchestratorStats {
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
        }
    }
}

/// Orchestrator that drives one ingestion worker.
///
/// The orchestrator:
/// - Processes one batch at a time to completion before polling the next
/// - Commits offsets only after the store accepted the whole batch
/// - Rewinds failed batches so the broker delivers them again
/// - Handles shutdown signals
pub struct Orchestrator {
    consumer: Arc<dyn BatchConsumer>,
    decoder: Arc<dyn EventDecoder>,
    processor: RecognitionProcessor,
    loader: RecognitionLoader,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    counters: Arc<Counters>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(
        consumer: Arc<dyn BatchConsumer>,
        decoder: Arc<dyn EventDecoder>,
        processor: RecognitionProcessor,
        loader: RecognitionLoader,
    ) -> Self {
        Self::with_config(
            consumer,
            decoder,
            processor,
            loader,
            OrchestratorConfig::default(),
        )
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: Arc<dyn BatchConsumer>,
        decoder: Arc<dyn EventDecoder>,
        processor: RecognitionProcessor,
        loader: RecognitionLoader,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer,
            decoder,
            processor,
            loader,
            config,
            shutdown_tx,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Run the orchestrator.
    ///
    /// Blocks until the consumer stream ends, a shutdown signal is received or a
    /// failed batch cannot be rewound.
    #[instrument(skip(self), fields(worker_id = self.config.worker_id))]
    pub async fn run(&self) -> Result<(), IngestError> {
        info!("Starting recognition indexer orchestrator");

        self.consumer.subscribe()?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut progress = Progress::new(self.counters.snapshot());

        info!("Ready to process recognition events from Kafka");

        loop {
            // Only the poll is raced against shutdown; a batch in flight always completes
            let polled = tokio::select! {
                polled = self.consumer.poll_batch() => polled,
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown request");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            };

            match polled {
                Ok(Some(batch)) => self.handle_batch(&batch).await?,
                Ok(None) => {
                    info!("Consumer stream ended");
                    break;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_ms = self.config.poll_error_backoff.as_millis() as u64,
                        "Failed to poll batch from consumer"
                    );
                    tokio::select! {
                        _ = sleep(self.config.poll_error_backoff) => {}
                        _ = shutdown_rx.recv() => {
                            info!("Received shutdown request");
                            break;
                        }
                    }
                }
            }

            if progress.due(self.config.progress_interval) {
                progress.log(self.counters.snapshot());
            }
        }

        let stats = self.counters.snapshot();
        info!(
            batches_committed = stats.batches_committed,
            batches_failed = stats.batches_failed,
            total_events_processed = stats.events_processed,
            total_documents_indexed = stats.documents_indexed,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Process one batch, then commit it or arrange for its redelivery.
    ///
    /// Only a failed rewind is returned: without it the failed records could be
    /// skipped by a later commit.
    async fn handle_batch(&self, batch: &MessageBatch) -> Result<(), IngestError> {
        match self.process_batch(batch).await {
            Ok(report) => match self.consumer.commit(batch).await {
                Ok(()) => {
                    self.counters
                        .batches_committed
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(
                        stage = %BatchStage::Acknowledged,
                        messages = report.messages,
                        documents = report.documents_indexed,
                        "Batch committed"
                    );
                }
                Err(e) => {
                    // Records stay uncommitted and come back after a restart or rebalance
                    warn!(
                        stage = %BatchStage::Persisted,
                        error = %e,
                        "Failed to commit offsets"
                    );
                }
            },
            Err(e) => {
                self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
                // Decoding, dedup and mapping cannot fail; only the write can
                error!(
                    stage = %BatchStage::Failed,
                    last_completed = %BatchStage::Mapped,
                    messages = batch.len(),
                    error = %e,
                    "Failed to persist batch, offsets not committed"
                );
                self.consumer.rewind(batch).await?;
            }
        }
        Ok(())
    }

    /// Decode, deduplicate, map and persist one batch.
    ///
    /// Returns `Ok` only once every document of the batch is in the store; the
    /// caller must not commit the batch otherwise.
    #[instrument(skip(self, batch), fields(message_count = batch.len()))]
    pub async fn process_batch(&self, batch: &MessageBatch) -> Result<BatchReport, IngestError> {
        if batch.is_empty() {
            debug!("Empty batch, nothing to index");
            return Ok(BatchReport::default());
        }

        let events: Vec<RecognitionEvent> = batch
            .messages()
            .iter()
            .filter_map(|msg| self.decoder.decode(msg))
            .collect();
        let decoded = events.len();

        debug!(
            stage = %BatchStage::Received,
            messages = batch.len(),
            decoded = decoded,
            "Decoded batch"
        );

        let processed = self.processor.process_batch(events);
        debug!(
            stage = %BatchStage::Deduplicated,
            duplicates_dropped = processed.duplicates_dropped,
            "Deduplicated batch"
        );

        let summary = self.loader.load(&processed.documents).await?;
        debug!(
            stage = %BatchStage::Persisted,
            documents = summary.succeeded,
            "Persisted batch"
        );

        let report = BatchReport {
            messages: batch.len(),
            decoded,
            decode_failures: batch.len() - decoded,
            duplicates_dropped: processed.duplicates_dropped,
            documents_indexed: summary.succeeded,
        };
        self.counters.record(&report);

        if report.decode_failures > 0 {
            warn!(
                decode_failures = report.decode_failures,
                "Dropped undecodable messages from batch"
            );
        }

        Ok(report)
    }

    /// Counters accumulated since startup.
    pub fn stats(&self) -> OrchestratorStats {
        self.counters.snapshot()
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// A sender that stops this orchestrator when `()` is sent on it.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

/// Rate-limited progress logging.
struct Progress {
    last: OrchestratorStats,
    at: Instant,
}

impl Progress {
    fn new(initial: OrchestratorStats) -> Self {
        Self {
            last: initial,
            at: Instant::now(),
        }
    }

    fn due(&self, interval: Duration) -> bool {
        self.at.elapsed() >= interval
    }

    fn log(&mut self, current: OrchestratorStats) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(self.at).as_secs_f64();

        let rate = |total: u64, prev: u64| {
            if elapsed_secs > 0.0 {
                (total.saturating_sub(prev) as f64) / elapsed_secs
            } else {
                0.0
            }
        };

        info!(
            batches_committed = current.batches_committed,
            batches_failed = current.batches_failed,
            events_processed = current.events_processed,
            documents_indexed = current.documents_indexed,
            duplicates_dropped = current.duplicates_dropped,
            decode_failures = current.decode_failures,
            events_per_sec = format!(
                "{:.2}",
                rate(current.events_processed, self.last.events_processed)
            ),
            documents_per_sec = format!(
                "{:.2}",
                rate(current.documents_indexed, self.last.documents_indexed)
            ),
            "Processing progress"
        );

        self.last = current;
        self.at = now;
    }
}
