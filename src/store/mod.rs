//! Document storage module
//!
//! Documents are schemaless JSON objects keyed by a locally generated id.
//! Persistence sits behind the `DocumentStore` trait so resources stay
//! agnostic of the backend; two plain implementations ship here (in-memory
//! and SQLite-backed).

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::filters::Filter;

/// A stored document. The id lives under the `"id"` key as a string.
pub type Document = serde_json::Map<String, Value>;

/// Storage-level failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Identifier of a stored document (UUID v4, hyphenated lowercase on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse either a plain id or a resource URI ending in one
    ///
    /// `/api/v1/note/<id>/` and `<id>` both resolve to the same id.
    #[must_use]
    pub fn from_uri_or_id(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_end_matches('/');
        let tail = match trimmed.rfind('/') {
            Some(pos) => &trimmed[pos + 1..],
            None => trimmed,
        };
        tail.parse().ok()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Extract the id of a document, if present and well formed
#[must_use]
pub fn document_id(document: &Document) -> Option<DocumentId> {
    document
        .get("id")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}

/// One sort criterion, applied in order
#[derive(Debug, Clone)]
pub struct SortKey {
    pub attribute: String,
    pub descending: bool,
}

/// A filtered, sorted, sliced read
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Result of a `find`: the page plus the match count before slicing
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub documents: Vec<Document>,
    pub total_count: usize,
}

/// Persistence seam for resources
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Filter, sort, then slice a collection
    async fn find(&self, collection: &str, query: &Query) -> Result<QueryResult, StoreError>;

    /// Fetch one document by id
    async fn get(&self, collection: &str, id: &DocumentId)
        -> Result<Option<Document>, StoreError>;

    /// Fetch several documents by id; missing ids are silently absent
    async fn get_many(
        &self,
        collection: &str,
        ids: &[DocumentId],
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert or replace a document (keyed by its `"id"`)
    async fn save(&self, collection: &str, document: &Document) -> Result<(), StoreError>;

    /// Remove a document; `false` when it did not exist
    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<bool, StoreError>;

    /// Number of documents in a collection
    async fn count(&self, collection: &str) -> Result<usize, StoreError>;
}

/// Validate that a document carries a usable id before persisting it
pub(crate) fn require_id(document: &Document) -> Result<DocumentId, StoreError> {
    document_id(document)
        .ok_or_else(|| StoreError::Corrupt("document has no valid `id` field".to_string()))
}

/// Sort documents in place by the given keys
///
/// JSON values order as: missing < null < bool < number < string < array
/// < object. Numbers compare numerically, everything else by its natural
/// ordering within the type.
pub(crate) fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        for key in keys {
            let ord = compare_attribute(a.get(&key.attribute), b.get(&key.attribute));
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 1,
        Value::Bool(_) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

fn compare_attribute(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()),
        (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()),
        _ => Ordering::Equal,
    }
}

/// Apply offset/limit to an already sorted match set
pub(crate) fn slice_page(documents: Vec<Document>, offset: usize, limit: Option<usize>) -> Vec<Document> {
    let iter = documents.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
