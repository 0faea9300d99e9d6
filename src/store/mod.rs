// src/store/mod.rs
pub mod jsonfile;
pub mod memory;

pub use jsonfile::JsonFileStore;
pub use memory::MemStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// The document-store seam: collections of JSON documents addressed by a
/// dedup key. The pipeline only ever needs create-if-absent inserts, an
/// emptiness probe, time-range queries, a "field absent" scan, and a
/// write-once field update, so that is the whole contract.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `doc` under `key` unless the key already exists.
    /// Returns whether a new document was written.
    async fn insert_if_absent(&self, collection: &str, key: &str, doc: Value) -> Result<bool>;

    /// Whether the collection holds no documents yet. Collectors use this
    /// to detect a source's first-ever run.
    async fn is_empty(&self, collection: &str) -> Result<bool>;

    /// Documents whose `time_field` falls in `[start, end]`, ascending by
    /// that field. Documents lacking a parsable timestamp are skipped.
    async fn query_range(
        &self,
        collection: &str,
        time_field: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>>;

    /// Up to `limit` documents where `field` is absent (or null), with their
    /// keys. Declarative counterpart of "scan for unscored records".
    async fn find_missing(
        &self,
        collection: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>>;

    /// Set `field` on the document at `key`, but only if it is still absent.
    /// Returns whether the write happened; an existing value is never
    /// overwritten.
    async fn update_if_missing(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<bool>;
}

/// Parse a document's timestamp field. Accepts the RFC 3339 form chrono
/// serializes `DateTime<Utc>` to.
pub(crate) fn field_time(doc: &Value, field: &str) -> Option<DateTime<Utc>> {
    doc.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// A field counts as missing when it is absent or explicitly null.
pub(crate) fn field_missing(doc: &Value, field: &str) -> bool {
    matches!(doc.get(field), None | Some(Value::Null))
}
