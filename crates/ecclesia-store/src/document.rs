//! Typed access to collections

use crate::error::{StoreError, StoreResult};
use crate::query::Query;
use crate::store::DocumentStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// A record stored in a named collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Collection name, e.g. `churches`
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// Typed repository over a [`DocumentStore`]
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(data) => Ok(Some(decode(data)?)),
            None => Ok(None),
        }
    }

    /// Like [`find_by_id`](Self::find_by_id) but missing documents are an error
    pub async fn get(&self, id: &str) -> StoreResult<T> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id))
    }

    pub async fn find_one(&self, query: Query) -> StoreResult<Option<T>> {
        let mut docs = self.store.query(T::COLLECTION, &query.limit(1)).await?;
        match docs.pop() {
            Some(data) => Ok(Some(decode(data)?)),
            None => Ok(None),
        }
    }

    pub async fn find_many(&self, query: Query) -> StoreResult<Vec<T>> {
        self.store
            .query(T::COLLECTION, &query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn count(&self, query: Query) -> StoreResult<u64> {
        self.store.count(T::COLLECTION, &query).await
    }

    /// Insert or replace
    pub async fn save(&self, doc: &T) -> StoreResult<()> {
        let data = serde_json::to_value(doc)?;
        self.store.set(T::COLLECTION, doc.id(), data).await
    }

    /// Insert unless a document with the same id exists
    pub async fn create(&self, doc: &T) -> StoreResult<bool> {
        let data = serde_json::to_value(doc)?;
        self.store.create(T::COLLECTION, doc.id(), data).await
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(T::COLLECTION, id).await
    }

    pub async fn increment(&self, id: &str, field: &str, delta: f64) -> StoreResult<Option<f64>> {
        self.store.increment(T::COLLECTION, id, field, delta).await
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> StoreResult<T> {
    Ok(serde_json::from_value(data)?)
}
