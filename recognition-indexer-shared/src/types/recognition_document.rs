//! Recognition document types for the search index.
//!
//! This module defines the document structure that is indexed in the search engine
//! and the mapping from a decoded [`RecognitionEvent`].

use serde::{Deserialize, Serialize};

use crate::types::recognition_event::RecognitionEvent;

/// A WGS84 coordinate pair, stored in the index as a `geo_point`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Document representation for the search index.
///
/// Identical to [`RecognitionEvent`] except that `lat`/`lon` are combined into a
/// single `location`. The document is keyed by `uniqueId`: the index holds at most
/// one document per id and a repeated write replaces the previous one.
///
/// # Fields
///
/// - `unique_id`: Primary key in the index (`uniqueId`)
/// - `timestamp`: Detection time in epoch milliseconds (`date` field)
/// - `source`: Device identifier (`keyword` field)
/// - `location`: Detection coordinates (`geo_point` field)
/// - `kind`: Classification label (`type`, `keyword` field)
/// - `confidence`: Classifier confidence (`float` field)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionDocument {
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    pub timestamp: i64,
    pub source: String,
    pub location: GeoPoint,
    #[serde(rename = "type")]
    pub kind: String,
    pub confidence: f32,
}

impl RecognitionDocument {
    /// Map a decoded event to its indexed form.
    ///
    /// Pure and total: every field is copied, `lat`/`lon` become `location`.
    ///
    /// # Example
    ///
    /// ```
    /// use recognition_indexer_shared::{RecognitionDocument, RecognitionEvent};
    ///
    /// let event = RecognitionEvent::new("det-1", 1672531199000, "device-A", 52.2, 21.0, "car", 0.9);
    /// let doc = RecognitionDocument::from_event(&event);
    ///
    /// assert_eq!(doc.document_id(), "det-1");
    /// assert_eq!(doc.location.lat, 52.2);
    /// ```
    pub fn from_event(event: &RecognitionEvent) -> Self {
        Self {
            unique_id: event.unique_id.clone(),
            timestamp: event.timestamp,
            source: event.source.clone(),
            location: GeoPoint::new(event.lat, event.lon),
            kind: event.kind.clone(),
            confidence: event.confidence,
        }
    }

    /// The document ID used in the search index.
    pub fn document_id(&self) -> &str {
        &self.unique_id
    }
}

impl From<RecognitionEvent> for RecognitionDocument {
    fn from(event: RecognitionEvent) -> Self {
        Self {
            unique_id: event.unique_id,
            timestamp: event.timestamp,
            source: event.source,
            location: GeoPoint::new(event.lat, event.lon),
            kind: event.kind,
            confidence: event.confidence,
        }
    }
}
