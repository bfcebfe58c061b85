//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `DocumentStore`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::{
        request::JsonBody,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use recognition_indexer_shared::RecognitionDocument;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::DocumentStore;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::types::{BulkUpsertSummary, EnsureIndexOutcome, UpsertResult};

/// Error type OpenSearch reports when creating an index that is already there.
const ALREADY_EXISTS_ERROR: &str = "resource_already_exists_exception";

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use recognition_indexer_repository::{DocumentStore, IndexConfig, OpenSearchProvider};
///
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexConfig::default()).await?;
/// provider.ensure_index().await?;
/// provider.upsert_all(&documents).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index name and shard layout
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the transport cannot be built
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            index = %index_config.name,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// The configured index.
    pub fn index_config(&self) -> &IndexConfig {
        &self.index_config
    }

    /// Verify that the cluster answers requests.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchIndexError::connection(format!(
                "Ping failed with status {}",
                status
            )));
        }
        Ok(())
    }

    async fn index_exists(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index_config.name.as_str()]))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            other => Err(SearchIndexError::index_creation(format!(
                "Unexpected status {} checking index {}",
                other, self.index_config.name
            ))),
        }
    }

    /// Whether a failed create-index response means another instance won the race.
    fn is_already_exists(status: u16, body: &Value) -> bool {
        status == 400 && body["error"]["type"].as_str() == Some(ALREADY_EXISTS_ERROR)
    }

    /// Build the `_bulk` body: one `index` action per document, keyed by `uniqueId`.
    ///
    /// `index` replaces the whole document, so repeated writes of the same id are
    /// last-write-wins and never produce a second document.
    fn bulk_body(documents: &[RecognitionDocument]) -> Result<Vec<Value>, SearchIndexError> {
        let mut body = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            let source = serde_json::to_value(doc)
                .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
            body.push(json!({ "index": { "_id": doc.document_id() } }));
            body.push(source);
        }
        Ok(body)
    }

    /// Turn a `_bulk` response into per-document results.
    ///
    /// Items are returned by OpenSearch in request order.
    fn summarize_bulk_response(
        documents: &[RecognitionDocument],
        body: &Value,
    ) -> Result<BulkUpsertSummary, SearchIndexError> {
        let items = body["items"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("Bulk response has no items"))?;

        if items.len() != documents.len() {
            return Err(SearchIndexError::parse(format!(
                "Bulk response has {} items for {} documents",
                items.len(),
                documents.len()
            )));
        }

        let results = documents
            .iter()
            .zip(items)
            .map(|(doc, item)| {
                let action = &item["index"];
                match action.get("error") {
                    Some(err) if !err.is_null() => {
                        let reason = err["reason"]
                            .as_str()
                            .or_else(|| err["type"].as_str())
                            .unwrap_or("unknown bulk item error");
                        UpsertResult::failed(doc.document_id(), reason)
                    }
                    _ => UpsertResult::succeeded(doc.document_id()),
                }
            })
            .collect();

        Ok(BulkUpsertSummary::from_results(results))
    }
}

#[async_trait]
impl DocumentStore for OpenSearchProvider {
    /// Check for the index and create it with the recognition mapping if absent.
    ///
    /// A `resource_already_exists_exception` from the create call means another
    /// instance created the index between our check and our create; it is reported
    /// as `AlreadyExists`.
    #[instrument(skip(self), fields(index = %self.index_config.name))]
    async fn ensure_index(&self) -> Result<EnsureIndexOutcome, SearchIndexError> {
        if self.index_exists().await? {
            info!("Index already exists, skipping creation");
            return Ok(EnsureIndexOutcome::AlreadyExists);
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index_config.name))
            .body(get_index_settings(&self.index_config))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if status.is_success() {
            info!("Index created");
            return Ok(EnsureIndexOutcome::Created);
        }

        let error_body = response.json::<Value>().await.unwrap_or(Value::Null);
        if Self::is_already_exists(status.as_u16(), &error_body) {
            warn!("Index was created concurrently by another instance");
            return Ok(EnsureIndexOutcome::AlreadyExists);
        }

        error!(status = %status, body = %error_body, "Create index request failed");
        Err(SearchIndexError::index_creation(format!(
            "Create index failed with status {}: {}",
            status, error_body
        )))
    }

    /// Write all documents in a single `_bulk` request.
    #[instrument(skip(self, documents), fields(index = %self.index_config.name, count = documents.len()))]
    async fn upsert_all(
        &self,
        documents: &[RecognitionDocument],
    ) -> Result<BulkUpsertSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BulkUpsertSummary::default());
        }

        let body: Vec<JsonBody<Value>> = Self::bulk_body(documents)?
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.name))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_index(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let response_body = response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::summarize_bulk_response(documents, &response_body)?;
        debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk upsert completed"
        );
        Ok(summary)
    }
}
