//! Message types for the consumer.
//!
//! Defines the raw broker records and batches that flow through the ingest.

use std::collections::BTreeMap;

/// A raw record polled from the broker, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

impl RawMessage {
    /// Create a new raw message with a payload and no key.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: Some(payload),
        }
    }

    /// Set the message key.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// The records delivered by one poll cycle, in broker order.
///
/// A batch may be empty when the poll timed out without receiving anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBatch {
    messages: Vec<RawMessage>,
}

impl MessageBatch {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Offsets to commit once the batch is persisted: the highest offset seen per
    /// (topic, partition), plus one.
    pub fn commit_offsets(&self) -> Vec<(String, i32, i64)> {
        let mut next: BTreeMap<(&str, i32), i64> = BTreeMap::new();
        for msg in &self.messages {
            let entry = next.entry((msg.topic.as_str(), msg.partition)).or_insert(msg.offset + 1);
            *entry = (*entry).max(msg.offset + 1);
        }
        next.into_iter()
            .map(|((topic, partition), offset)| (topic.to_string(), partition, offset))
            .collect()
    }

    /// Offsets to seek to for redelivery: the lowest offset seen per (topic, partition).
    pub fn rewind_offsets(&self) -> Vec<(String, i32, i64)> {
        let mut first: BTreeMap<(&str, i32), i64> = BTreeMap::new();
        for msg in &self.messages {
            let entry = first.entry((msg.topic.as_str(), msg.partition)).or_insert(msg.offset);
            *entry = (*entry).min(msg.offset);
        }
        first
            .into_iter()
            .map(|((topic, partition), offset)| (topic.to_string(), partition, offset))
            .collect()
    }
}
