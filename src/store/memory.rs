// src/store/memory.rs
// In-memory store for tests and offline evaluation. Same contract as the
// file-backed store, BTreeMap so scans are deterministic.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{field_missing, field_time, DocumentStore};

#[derive(Debug, Default)]
pub struct MemStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection (test assertions).
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .expect("store mutex poisoned")
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemStore {
    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Value) -> Result<bool> {
        let mut cols = self.collections.lock().expect("store mutex poisoned");
        let col = cols.entry(collection.to_string()).or_default();
        if col.contains_key(key) {
            return Ok(false);
        }
        col.insert(key.to_string(), doc);
        Ok(true)
    }

    async fn is_empty(&self, collection: &str) -> Result<bool> {
        Ok(self.len(collection) == 0)
    }

    async fn query_range(
        &self,
        collection: &str,
        time_field: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>> {
        let cols = self.collections.lock().expect("store mutex poisoned");
        let mut hits: Vec<(DateTime<Utc>, Value)> = cols
            .get(collection)
            .into_iter()
            .flat_map(|col| col.values())
            .filter_map(|doc| {
                let t = field_time(doc, time_field)?;
                (t >= start && t <= end).then(|| (t, doc.clone()))
            })
            .collect();
        hits.sort_by_key(|(t, _)| *t);
        Ok(hits.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn find_missing(
        &self,
        collection: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>> {
        let cols = self.collections.lock().expect("store mutex poisoned");
        Ok(cols
            .get(collection)
            .into_iter()
            .flat_map(|col| col.iter())
            .filter(|(_, doc)| field_missing(doc, field))
            .take(limit)
            .map(|(k, doc)| (k.clone(), doc.clone()))
            .collect())
    }

    async fn update_if_missing(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<bool> {
        let mut cols = self.collections.lock().expect("store mutex poisoned");
        let Some(doc) = cols.get_mut(collection).and_then(|col| col.get_mut(key)) else {
            return Ok(false);
        };
        if !field_missing(doc, field) {
            return Ok(false);
        }
        let Some(obj) = doc.as_object_mut() else {
            return Ok(false);
        };
        obj.insert(field.to_string(), value);
        Ok(true)
    }
}
