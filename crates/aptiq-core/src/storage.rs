//! Storage trait shared by every backend.
//!
//! The engine talks to persistence only through [`StorageBackend`]: a small
//! document store with `get`/`put`/`append`/`query`. Documents are JSON
//! bodies with a list of `(field, value)` index entries used for equality
//! filtering. Backends are implemented in `aptiq-store` (SQLite) and in
//! [`crate::memory`] (in-process map).

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Storage backend trait
// ---------------------------------------------------------------------------

/// Trait for persistence backends holding the question bank and the
/// session archive.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Human-readable backend name (e.g. "sqlite").
    fn name(&self) -> &str;

    /// Fetch one document by key.
    async fn get(&self, collection: Collection, key: &str)
        -> Result<Option<StoredDocument>, StoreError>;

    /// Insert or replace a document under its key.
    async fn put(&self, collection: Collection, document: Document) -> Result<(), StoreError>;

    /// Insert or replace several documents atomically.
    async fn put_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> Result<usize, StoreError>;

    /// Append a document under the next auto-increment key and return it.
    /// The document's own `key` is ignored.
    async fn append(&self, collection: Collection, document: Document) -> Result<u64, StoreError>;

    /// Run an index query.
    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Number of documents in a collection.
    async fn count(&self, collection: Collection) -> Result<usize, StoreError>;
}

/// The two logical collections the engine persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Keyed by question id; indexed on type, category, difficulty, tags.
    Questions,
    /// Auto-increment key; indexed on user_id, completed, start_time.
    QuizSessions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Questions => "questions",
            Collection::QuizSessions => "quiz_sessions",
        }
    }

    /// Fields a query may filter on for this collection.
    pub fn indexed_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Questions => &["type", "category", "difficulty", "tags"],
            Collection::QuizSessions => &["user_id", "completed", "start_time"],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One secondary index entry. Multi-valued fields (tags) produce one entry
/// per value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    pub field: String,
    pub value: String,
}

impl IndexEntry {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A document to be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub key: String,
    pub body: serde_json::Value,
    #[serde(default)]
    pub index: Vec<IndexEntry>,
}

impl Document {
    /// Serialize `value` into a document body.
    pub fn from_value<T: Serialize>(
        key: impl Into<String>,
        value: &T,
        index: Vec<IndexEntry>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            key: key.into(),
            body: serde_json::to_value(value)?,
            index,
        })
    }
}

/// A document as read back from a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub key: String,
    /// Insertion sequence number, unique and increasing per collection.
    pub seq: u64,
    pub body: serde_json::Value,
}

impl StoredDocument {
    /// Decode the body into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Result ordering, by insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// An equality-filter query over index entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// All filters must match (AND).
    #[serde(default)]
    pub filters: Vec<IndexEntry>,
    #[serde(default)]
    pub order: Order,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(IndexEntry::new(field, value));
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = Order::Descending;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject filters on fields `collection` does not index.
    pub fn check_fields(&self, collection: Collection) -> Result<(), StoreError> {
        let indexed = collection.indexed_fields();
        match self
            .filters
            .iter()
            .find(|f| !indexed.contains(&f.field.as_str()))
        {
            Some(f) => Err(StoreError::Backend(format!(
                "{collection} has no index on '{}'",
                f.field
            ))),
            None => Ok(()),
        }
    }

    /// Returns `true` if a document with these index entries passes every
    /// filter.
    pub fn matches(&self, index: &[IndexEntry]) -> bool {
        self.filters.iter().all(|f| index.contains(f))
    }
}
