// src/store/jsonfile.rs
// One JSON file per collection under a data directory; each file holds a
// key -> document map. Writes go through a temp file + rename so a crashed
// run never leaves a half-written collection behind.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{field_missing, field_time, DocumentStore};

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process. Cross-process
    // safety comes from the RunLock and the idempotence of every write.
    guard: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `dir`. Fails when the
    /// directory cannot be created, which entry points treat as fatal.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
        Ok(Self {
            dir,
            guard: Mutex::new(()),
        })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    fn load(&self, collection: &str) -> Result<Map<String, Value>> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading collection {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing collection {}", path.display()))
    }

    fn save(&self, collection: &str, docs: &Map<String, Value>) -> Result<()> {
        let path = self.collection_path(collection);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(docs).context("serializing collection")?;
        std::fs::write(&tmp, body)
            .with_context(|| format!("writing collection {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("committing collection {}", path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for JsonFileStore {
    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Value) -> Result<bool> {
        let _g = self.guard.lock().expect("store mutex poisoned");
        let mut docs = self.load(collection)?;
        if docs.contains_key(key) {
            return Ok(false);
        }
        docs.insert(key.to_string(), doc);
        self.save(collection, &docs)?;
        Ok(true)
    }

    async fn is_empty(&self, collection: &str) -> Result<bool> {
        let _g = self.guard.lock().expect("store mutex poisoned");
        Ok(self.load(collection)?.is_empty())
    }

    async fn query_range(
        &self,
        collection: &str,
        time_field: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>> {
        let _g = self.guard.lock().expect("store mutex poisoned");
        let docs = self.load(collection)?;
        let mut hits: Vec<(DateTime<Utc>, Value)> = docs
            .into_iter()
            .filter_map(|(_, doc)| {
                let t = field_time(&doc, time_field)?;
                (t >= start && t <= end).then_some((t, doc))
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
        let _g = self.guard.lock().expect("store mutex poisoned");
        let docs = self.load(collection)?;
        Ok(docs
            .into_iter()
            .filter(|(_, doc)| field_missing(doc, field))
            .take(limit)
            .collect())
    }

    async fn update_if_missing(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<bool> {
        let _g = self.guard.lock().expect("store mutex poisoned");
        let mut docs = self.load(collection)?;
        let Some(doc) = docs.get_mut(key) else {
            return Ok(false);
        };
        if !field_missing(doc, field) {
            return Ok(false);
        }
        let Some(obj) = doc.as_object_mut() else {
            return Ok(false);
        };
        obj.insert(field.to_string(), value);
        self.save(collection, &docs)?;
        Ok(true)
    }
}

impl JsonFileStore {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_is_create_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.is_empty("c").await.unwrap());

        assert!(store
            .insert_if_absent("c", "k1", json!({"v": 1}))
            .await
            .unwrap());
        assert!(!store
            .insert_if_absent("c", "k1", json!({"v": 2}))
            .await
            .unwrap());
        assert!(!store.is_empty("c").await.unwrap());

        // The first value won and survived the second attempt.
        let all = store
            .query_range(
                "c",
                "ts",
                DateTime::<Utc>::MIN_UTC,
                DateTime::<Utc>::MAX_UTC,
            )
            .await
            .unwrap();
        assert!(all.is_empty()); // no ts field, so range query skips it

        let missing = store.find_missing("c", "sentiment", 10).await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].1["v"], 1);
    }

    #[tokio::test]
    async fn update_if_missing_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .insert_if_absent("c", "k", json!({"title": "t"}))
            .await
            .unwrap();

        assert!(store
            .update_if_missing("c", "k", "sentiment", json!({"score": 0.7}))
            .await
            .unwrap());
        assert!(!store
            .update_if_missing("c", "k", "sentiment", json!({"score": 0.1}))
            .await
            .unwrap());
        assert!(!store
            .update_if_missing("c", "absent", "sentiment", json!({}))
            .await
            .unwrap());

        let missing = store.find_missing("c", "sentiment", 10).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn range_query_is_time_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        for (key, ts) in [
            ("b", "2024-05-01T10:00:00Z"),
            ("a", "2024-05-01T12:00:00Z"),
            ("c", "2024-05-01T08:00:00Z"),
            ("d", "2024-06-01T00:00:00Z"), // outside range
        ] {
            store
                .insert_if_absent("bars", key, json!({"timestamp": ts}))
                .await
                .unwrap();
        }
        let start = "2024-05-01T00:00:00Z".parse().unwrap();
        let end = "2024-05-02T00:00:00Z".parse().unwrap();
        let hits = store.query_range("bars", "timestamp", start, end).await.unwrap();
        let order: Vec<_> = hits.iter().map(|d| d["timestamp"].as_str().unwrap()).collect();
        assert_eq!(
            order,
            vec![
                "2024-05-01T08:00:00Z",
                "2024-05-01T10:00:00Z",
                "2024-05-01T12:00:00Z"
            ]
        );
    }

    #[tokio::test]
    async fn collections_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store
                .insert_if_absent("c", "k", json!({"v": 1}))
                .await
                .unwrap();
        }
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(!store
            .insert_if_absent("c", "k", json!({"v": 2}))
            .await
            .unwrap());
    }
}
