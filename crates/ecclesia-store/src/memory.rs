//! In-process document store

use crate::error::{StoreError, StoreResult};
use crate::query::Query;
use crate::store::DocumentStore;
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type Collection = BTreeMap<String, Value>;

/// Document store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total documents across all collections
    pub async fn len(&self) -> usize {
        self.collections.read().await.values().map(|c| c.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Ok(false);
        }
        docs.insert(id.to_string(), data);
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Value>> {
        let collections = self.collections.read().await;
        let matched: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| query.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(query.apply_order_and_limit(matched))
    }

    async fn count(&self, collection: &str, query: &Query) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().filter(|doc| query.matches(doc)).count() as u64)
            .unwrap_or(0))
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: f64,
    ) -> StoreResult<Option<f64>> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        else {
            return Ok(None);
        };
        let Some(object) = doc.as_object_mut() else {
            return Err(StoreError::Serialization(format!(
                "Document '{}' in '{}' is not an object",
                id, collection
            )));
        };

        let current = object.get(field).and_then(Value::as_f64).unwrap_or(0.0);
        let updated = current + delta;
        object.insert(field.to_string(), number_value(updated));
        Ok(Some(updated))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Keep whole numbers integral so counters deserialize into integer fields
pub(crate) fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
