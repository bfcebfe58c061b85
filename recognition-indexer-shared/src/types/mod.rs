//! This module defines the core data structures used across the recognition indexer.
//! It re-exports `RecognitionEvent` and `RecognitionDocument`.

pub mod recognition_document;
pub mod recognition_event;

pub use recognition_document::{GeoPoint, RecognitionDocument};
pub use recognition_event::RecognitionEvent;
