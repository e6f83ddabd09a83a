use crate::error::StoreResult;
use crate::query::Query;
use async_trait::async_trait;
use serde_json::Value;

/// Backend-agnostic document storage
///
/// Documents are JSON objects addressed by `(collection, id)`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Insert or replace a document
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()>;

    /// Insert only when the id is free. Returns whether the document was written.
    async fn create(&self, collection: &str, id: &str, data: Value) -> StoreResult<bool>;

    /// Remove a document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Documents matching the query's filters, ordered and limited
    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Value>>;

    /// Number of documents matching the query's filters
    async fn count(&self, collection: &str, query: &Query) -> StoreResult<u64>;

    /// Atomically add `delta` to a numeric field (missing counts as zero).
    /// Returns the new value, or `None` if the document does not exist.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: f64,
    ) -> StoreResult<Option<f64>>;

    async fn health_check(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}
