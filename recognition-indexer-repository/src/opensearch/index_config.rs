//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the recognition index.

use serde_json::{json, Value};

/// The default name of the recognition index.
pub const INDEX_NAME: &str = "recognitions";

/// Default number of primary shards.
const DEFAULT_NUMBER_OF_SHARDS: u32 = 3;

/// Default number of replicas.
const DEFAULT_NUMBER_OF_REPLICAS: u32 = 1;

/// Configuration for the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// The index name used for all operations.
    pub name: String,
    /// Number of primary shards, applied only when the index is created.
    pub number_of_shards: u32,
    /// Number of replicas, applied only when the index is created.
    pub number_of_replicas: u32,
}

impl IndexConfig {
    /// Create a new index configuration with the default shard layout.
    ///
    /// # Arguments
    ///
    /// * `name` - The index name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number_of_shards: DEFAULT_NUMBER_OF_SHARDS,
            number_of_replicas: DEFAULT_NUMBER_OF_REPLICAS,
        }
    }

    /// Override the shard layout.
    pub fn with_shards(mut self, number_of_shards: u32, number_of_replicas: u32) -> Self {
        self.number_of_shards = number_of_shards;
        self.number_of_replicas = number_of_replicas;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(INDEX_NAME)
    }
}

/// Get the index settings and mappings for the recognition index.
///
/// The mapping is fixed:
/// - **timestamp**: `date` (epoch milliseconds)
/// - **source**, **uniqueId**, **type**: `keyword` for exact-match filtering
/// - **location**: `geo_point`
/// - **confidence**: `float`
///
/// Mappings of an existing index are never updated.
pub fn get_index_settings(config: &IndexConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas
        },
        "mappings": {
            "properties": {
                "timestamp": {
                    "type": "date"
                },
                "source": {
                    "type": "keyword"
                },
                "uniqueId": {
                    "type": "keyword"
                },
                "location": {
                    "type": "geo_point"
                },
                "type": {
                    "type": "keyword"
                },
                "confidence": {
                    "type": "float"
                }
            }
        }
    })
}
