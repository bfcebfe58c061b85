//! Search index error types.

use thiserror::Error;

/// Unified errors from document store operations.
///
/// Used by the `DocumentStore` trait for every backend. An index that already
/// exists is not an error: it is reported through
/// [`EnsureIndexOutcome::AlreadyExists`](crate::EnsureIndexOutcome).
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Failed to establish connection to the search index backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to check for or create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Bulk upsert request failed.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search index backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The backend is not accepting requests.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl SearchIndexError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every variant is reachable through its helper; the match is exhaustive, so a
    /// variant without a constructor fails to compile here.
    #[test]
    fn test_helpers_cover_every_variant() {
        let errors = [
            SearchIndexError::connection("refused"),
            SearchIndexError::index_creation("bad mapping"),
            SearchIndexError::bulk_index("status 500"),
            SearchIndexError::parse("no items"),
            SearchIndexError::serialization("nan"),
            SearchIndexError::unavailable("down"),
        ];

        let messages: Vec<String> = errors
            .iter()
            .map(|e| match e {
                SearchIndexError::ConnectionError(m)
                | SearchIndexError::IndexCreationError(m)
                | SearchIndexError::BulkIndexError(m)
                | SearchIndexError::ParseError(m)
                | SearchIndexError::SerializationError(m)
                | SearchIndexError::Unavailable(m) => m.clone(),
            })
            .collect();

        assert_eq!(
            messages,
            vec!["refused", "bad mapping", "status 500", "no items", "nan", "down"]
        );
        assert_eq!(errors[5].to_string(), "Store unavailable: down");
    }
}
