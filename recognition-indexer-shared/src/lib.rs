//! # Recognition Indexer Shared
//!
//! This crate defines shared data structures used across the recognition indexer.
//! It includes the event decoded from the broker and the document persisted in the
//! search index.

pub mod types;

pub use types::recognition_document::{GeoPoint, RecognitionDocument};
pub use types::recognition_event::RecognitionEvent;
