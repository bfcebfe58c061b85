//! Integration tests for the recognition indexer orchestrator.
//!
//! These tests use the real Orchestrator, decoder, processor and loader with a
//! scripted consumer and the in-memory document store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

use recognition_indexer::consumer::{
    AvroEventDecoder, BatchConsumer, MessageBatch, RawMessage, RECOGNITIONS_TOPIC,
};
use recognition_indexer::errors::IngestError;
use recognition_indexer::loader::RecognitionLoader;
use recognition_indexer::orchestrator::{BatchReport, Orchestrator, OrchestratorConfig};
use recognition_indexer::processor::RecognitionProcessor;
use recognition_indexer_repository::{
    BulkUpsertSummary, DocumentStore, EnsureIndexOutcome, InMemoryDocumentStore,
    SearchIndexError,
};
use recognition_indexer_shared::{RecognitionDocument, RecognitionEvent};

/// Consumer that hands out a fixed list of batches.
///
/// A rewound batch is put back at the front of the queue, the way the broker
/// delivers uncommitted records again after a seek.
struct ScriptedConsumer {
    batches: Mutex<VecDeque<MessageBatch>>,
    commits: Mutex<Vec<MessageBatch>>,
    rewinds: Mutex<Vec<MessageBatch>>,
    idle_when_drained: bool,
    fail_subscribe: bool,
    fail_rewind: bool,
    poll_failures_left: AtomicUsize,
    polls: AtomicUsize,
}

impl ScriptedConsumer {
    fn new(batches: Vec<MessageBatch>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            commits: Mutex::new(Vec::new()),
            rewinds: Mutex::new(Vec::new()),
            idle_when_drained: false,
            fail_subscribe: false,
            fail_rewind: false,
            poll_failures_left: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    /// Keep returning empty batches instead of ending the stream.
    fn idle(mut self) -> Self {
        self.idle_when_drained = true;
        self
    }

    fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    fn failing_rewind(mut self) -> Self {
        self.fail_rewind = true;
        self
    }

    /// Fail the first `failures` polls before handing out batches.
    fn failing_polls(self, failures: usize) -> Self {
        self.poll_failures_left.store(failures, Ordering::SeqCst);
        self
    }

    fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }

    fn rewind_count(&self) -> usize {
        self.rewinds.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl BatchConsumer for ScriptedConsumer {
    fn subscribe(&self) -> Result<(), IngestError> {
        if self.fail_subscribe {
            Err(IngestError::KafkaError("Mock subscribe error".to_string()))
        } else {
            Ok(())
        }
    }

    async fn poll_batch(&self) -> Result<Option<MessageBatch>, IngestError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.poll_failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.poll_failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(IngestError::KafkaError("Mock poll error".to_string()));
        }
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(Some(batch)),
            None if self.idle_when_drained => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Some(MessageBatch::default()))
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, batch: &MessageBatch) -> Result<(), IngestError> {
        self.commits.lock().unwrap().push(batch.clone());
        Ok(())
    }

    async fn rewind(&self, batch: &MessageBatch) -> Result<(), IngestError> {
        if self.fail_rewind {
            return Err(IngestError::KafkaError("Mock seek error".to_string()));
        }
        self.rewinds.lock().unwrap().push(batch.clone());
        self.batches.lock().unwrap().push_front(batch.clone());
        // Redelivery backoff
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(())
    }
}

/// Store that fails the first `failures` bulk upserts, then behaves like the
/// in-memory store.
struct FlakyStore {
    inner: InMemoryDocumentStore,
    failures_left: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for FlakyStore {
    async fn ensure_index(&self) -> Result<EnsureIndexOutcome, SearchIndexError> {
        self.inner.ensure_index().await
    }

    async fn upsert_all(
        &self,
        documents: &[RecognitionDocument],
    ) -> Result<BulkUpsertSummary, SearchIndexError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(SearchIndexError::unavailable("connection refused"));
        }
        self.inner.upsert_all(documents).await
    }
}

fn event(id: &str, confidence: f32) -> RecognitionEvent {
    RecognitionEvent::new(
        id,
        1672531199000,
        "device-A",
        52.2297,
        21.0122,
        "car",
        confidence,
    )
}

/// Encode events as consecutive records of partition 0 starting at `first_offset`.
fn batch(first_offset: i64, events: &[RecognitionEvent]) -> MessageBatch {
    let decoder = AvroEventDecoder::new().unwrap();
    MessageBatch::new(
        events
            .iter()
            .enumerate()
            .map(|(i, e)| {
                RawMessage::new(
                    RECOGNITIONS_TOPIC,
                    0,
                    first_offset + i as i64,
                    decoder.encode(e, 1).unwrap(),
                )
                .with_key(e.unique_id.as_bytes())
            })
            .collect(),
    )
}

fn orchestrator(consumer: Arc<ScriptedConsumer>, store: Arc<dyn DocumentStore>) -> Orchestrator {
    Orchestrator::new(
        consumer,
        Arc::new(AvroEventDecoder::new().unwrap()),
        RecognitionProcessor::new(),
        RecognitionLoader::new(store),
    )
}

#[tokio::test]
async fn test_duplicates_in_batch_index_first_occurrence() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(ScriptedConsumer::new(vec![batch(
        0,
        &[event("a", 0.9), event("a", 0.5), event("b", 0.7)],
    )]));
    let orchestrator = orchestrator(consumer.clone(), store.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a").unwrap().confidence, 0.9);
    assert_eq!(store.upsert_calls(), 1);
    assert_eq!(consumer.commit_count(), 1);

    let stats = orchestrator.stats();
    assert_eq!(stats.duplicates_dropped, 1);
    assert_eq!(stats.documents_indexed, 2);
}

#[tokio::test]
async fn test_process_batch_report() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(ScriptedConsumer::new(Vec::new()));
    let orchestrator = orchestrator(consumer, store.clone());

    let report = orchestrator
        .process_batch(&batch(
            10,
            &[event("a", 0.9), event("a", 0.5), event("b", 0.7)],
        ))
        .await
        .unwrap();

    assert_eq!(
        report,
        BatchReport {
            messages: 3,
            decoded: 3,
            decode_failures: 0,
            duplicates_dropped: 1,
            documents_indexed: 2,
        }
    );
    assert_eq!(
        store.get("b").unwrap().location,
        RecognitionDocument::from_event(&event("b", 0.7)).location
    );
}

#[tokio::test]
async fn test_empty_batch_commits_without_store_call() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(ScriptedConsumer::new(vec![MessageBatch::default()]));
    let orchestrator = orchestrator(consumer.clone(), store.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(store.upsert_calls(), 0);
    assert_eq!(consumer.commit_count(), 1);
    assert_eq!(consumer.rewind_count(), 0);
}

#[tokio::test]
async fn test_undecodable_messages_are_dropped() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let mut messages = batch(0, &[event("a", 0.9)]).messages().to_vec();
    messages.push(RawMessage::new(RECOGNITIONS_TOPIC, 0, 1, vec![0xff, 0x01, 0x02]));
    messages.push(RawMessage {
        topic: RECOGNITIONS_TOPIC.to_string(),
        partition: 0,
        offset: 2,
        key: None,
        payload: None,
    });
    let consumer = Arc::new(ScriptedConsumer::new(vec![MessageBatch::new(messages)]));
    let orchestrator = orchestrator(consumer.clone(), store.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(store.len(), 1);
    assert!(store.get("a").is_some());
    assert_eq!(consumer.commit_count(), 1);
    assert_eq!(orchestrator.stats().decode_failures, 2);
}

#[tokio::test]
async fn test_store_failure_blocks_commit_and_redelivery_converges() {
    let store = Arc::new(FlakyStore::new(1));
    let consumer = Arc::new(ScriptedConsumer::new(vec![batch(
        0,
        &[event("a", 0.9), event("b", 0.4)],
    )]));
    let orchestrator = orchestrator(consumer.clone(), store.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    // First attempt failed and was rewound, second attempt succeeded and committed
    assert_eq!(consumer.rewind_count(), 1);
    assert_eq!(consumer.commit_count(), 1);
    assert_eq!(orchestrator.stats().batches_failed, 1);

    let reference = InMemoryDocumentStore::new();
    reference
        .upsert_all(&[
            RecognitionDocument::from_event(&event("a", 0.9)),
            RecognitionDocument::from_event(&event("b", 0.4)),
        ])
        .await
        .unwrap();
    assert_eq!(store.inner.documents(), reference.documents());
}

#[tokio::test]
async fn test_store_down_never_commits() {
    let store = Arc::new(InMemoryDocumentStore::new());
    store.set_unavailable(true);
    let consumer = Arc::new(ScriptedConsumer::new(vec![batch(0, &[event("a", 0.9)])]));
    let orchestrator = Arc::new(orchestrator(consumer.clone(), store.clone()));

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    };

    // Let a few redelivery cycles happen, then stop the worker
    while consumer.rewind_count() < 3 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    orchestrator.shutdown();

    let result = timeout(Duration::from_secs(5), runner).await;
    assert!(result.unwrap().unwrap().is_ok());
    assert_eq!(consumer.commit_count(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_redelivered_batch_is_idempotent() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let redelivered = batch(0, &[event("a", 0.9), event("b", 0.4)]);
    let consumer = Arc::new(ScriptedConsumer::new(vec![
        redelivered.clone(),
        redelivered,
    ]));
    let orchestrator = orchestrator(consumer.clone(), store.clone());

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(store.len(), 2);
    assert_eq!(store.upsert_calls(), 2);
    assert_eq!(consumer.commit_count(), 2);
}

#[tokio::test]
async fn test_two_workers_share_one_store() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let first = Arc::new(ScriptedConsumer::new(vec![
        batch(0, &[event("a", 0.9), event("b", 0.8)]),
        batch(2, &[event("c", 0.7)]),
    ]));
    let second = Arc::new(ScriptedConsumer::new(vec![batch(
        0,
        &[event("b", 0.8), event("c", 0.7), event("d", 0.6)],
    )]));
    let worker_a = orchestrator(first.clone(), store.clone());
    let worker_b = orchestrator(second.clone(), store.clone());

    let (a, b) = timeout(
        Duration::from_secs(5),
        async { tokio::join!(worker_a.run(), worker_b.run()) },
    )
    .await
    .unwrap();
    assert!(a.is_ok());
    assert!(b.is_ok());

    let ids: Vec<String> = store.documents().into_iter().map(|d| d.unique_id).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(first.commit_count(), 2);
    assert_eq!(second.commit_count(), 1);
}

#[tokio::test]
async fn test_orchestrator_shutdown() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(ScriptedConsumer::new(Vec::new()).idle());
    let orchestrator = Arc::new(orchestrator(consumer.clone(), store));

    let shutdown = orchestrator.shutdown_handle();
    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.send(()).unwrap();

    let result = timeout(Duration::from_secs(5), runner).await;
    assert!(result.is_ok(), "Orchestrator should stop after shutdown");
    assert!(result.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_orchestrator_subscribe_error() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(ScriptedConsumer::new(Vec::new()).failing_subscribe());
    let orchestrator = orchestrator(consumer, store);

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(matches!(result.unwrap(), Err(IngestError::KafkaError(_))));
}

#[tokio::test]
async fn test_rewind_failure_stops_worker() {
    let store = Arc::new(InMemoryDocumentStore::new());
    store.set_unavailable(true);
    let consumer = Arc::new(
        ScriptedConsumer::new(vec![batch(0, &[event("a", 0.9)])]).failing_rewind(),
    );
    let orchestrator = orchestrator(consumer.clone(), store);

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(matches!(result.unwrap(), Err(IngestError::KafkaError(_))));
    assert_eq!(consumer.commit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_errors_back_off_before_retrying() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(
        ScriptedConsumer::new(vec![batch(0, &[event("a", 0.9)])]).failing_polls(3),
    );
    let orchestrator = Orchestrator::with_config(
        consumer.clone(),
        Arc::new(AvroEventDecoder::new().unwrap()),
        RecognitionProcessor::new(),
        RecognitionLoader::new(store.clone()),
        OrchestratorConfig {
            poll_error_backoff: Duration::from_millis(200),
            ..OrchestratorConfig::default()
        },
    );

    let started = tokio::time::Instant::now();
    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(result.unwrap().is_ok());
    assert!(started.elapsed() >= Duration::from_millis(600));
    // Three failed polls, the batch, then the end of the stream
    assert_eq!(consumer.poll_count(), 5);
    assert_eq!(consumer.commit_count(), 1);
    assert!(store.get("a").is_some());
}
