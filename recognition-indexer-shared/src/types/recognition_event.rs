//! Recognition events as they arrive on the broker topic.

use serde::{Deserialize, Serialize};

/// A single detection reported by a sensor or vision device.
///
/// Field order matches the record layout of the wire schema. Values are produced
/// by the event decoder and are never persisted directly; see
/// [`RecognitionDocument`](crate::RecognitionDocument) for the indexed form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionEvent {
    /// Detection time in epoch milliseconds.
    pub timestamp: i64,
    /// Device or sensor identifier.
    pub source: String,
    /// Globally unique id of the logical detection.
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    /// WGS84 latitude in degrees.
    pub lat: f64,
    /// WGS84 longitude in degrees.
    pub lon: f64,
    /// Classification label (e.g. "car").
    #[serde(rename = "type")]
    pub kind: String,
    /// Classifier confidence, expected in [0, 1] but not enforced.
    pub confidence: f32,
}

impl RecognitionEvent {
    /// Create a new recognition event.
    pub fn new(
        unique_id: impl Into<String>,
        timestamp: i64,
        source: impl Into<String>,
        lat: f64,
        lon: f64,
        kind: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            timestamp,
            source: source.into(),
            unique_id: unique_id.into(),
            lat,
            lon,
            kind: kind.into(),
            confidence,
        }
    }
}
