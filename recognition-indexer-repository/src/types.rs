//! Request and response types for document store operations.

/// Result of ensuring the index exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureIndexOutcome {
    /// The index was created by this call.
    Created,
    /// The index already existed, possibly created by a concurrent instance.
    AlreadyExists,
}

/// Result of the upsert of a single document within a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertResult {
    /// The document's unique identifier.
    pub unique_id: String,
    /// Whether the write succeeded.
    pub success: bool,
    /// Backend error if the write failed.
    pub error: Option<String>,
}

impl UpsertResult {
    pub fn succeeded(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(unique_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Summary of a bulk upsert containing aggregate statistics and individual results.
///
/// Callers decide how to treat partial failures; the ingestion pipeline treats any
/// failed document as a failed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkUpsertSummary {
    /// Total number of documents in the request.
    pub total: usize,
    /// Number of successful writes.
    pub succeeded: usize,
    /// Number of failed writes.
    pub failed: usize,
    /// Individual results for each document.
    pub results: Vec<UpsertResult>,
}

impl BulkUpsertSummary {
    /// Build a summary from individual results.
    pub fn from_results(results: Vec<UpsertResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Whether every document was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = BulkUpsertSummary::from_results(vec![
            UpsertResult::succeeded("a"),
            UpsertResult::failed("b", "mapper_parsing_exception"),
            UpsertResult::succeeded("c"),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_empty_summary_is_complete() {
        let summary = BulkUpsertSummary::default();
        assert_eq!(summary.total, 0);
        assert!(summary.is_complete());
    }
}
