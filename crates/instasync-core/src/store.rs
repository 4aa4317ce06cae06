//! The document-store seam.
//!
//! Collections hold JSON object documents keyed by a string id. Backends
//! live in `instasync-storage`; the sync runner and handlers only see
//! [`DocumentStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// A stored document and its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Listing parameters. Results are ordered by document id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Top-level field equality filter.
    pub filter: Option<(String, Value)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// One-based page of `limit` documents. Pages past `usize::MAX`
    /// documents are simply empty.
    pub fn page(self, page: usize, limit: usize) -> Self {
        self.limit(limit)
            .offset(page.saturating_sub(1).saturating_mul(limit))
    }

    /// Does `data` pass the filter?
    pub fn matches(&self, data: &Value) -> bool {
        match &self.filter {
            None => true,
            Some((field, expected)) => data.get(field) == Some(expected),
        }
    }

    /// Apply filter, offset and limit to documents already sorted by id.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        docs.into_iter()
            .filter(|d| self.matches(&d.data))
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or overwrite.
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Shallow-merge into an existing document.
    Update {
        collection: String,
        id: String,
        fields: Value,
    },
    Delete { collection: String, id: String },
}

/// An ordered group of writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.into(),
            id: id.into(),
            data,
        });
        self
    }

    pub fn update(&mut self, collection: &str, id: &str, fields: Value) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Shallow merge: top-level keys of `fields` overwrite those of `target`.
pub fn merge_fields(target: &mut Value, fields: &Value) {
    match (target, fields) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        (dst, src) => *dst = src.clone(),
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, SyncError>;

    /// Create or overwrite.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), SyncError>;

    /// Shallow merge into an existing document; [`SyncError::NotFound`] if
    /// it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), SyncError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, SyncError>;

    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, SyncError>;

    async fn count(&self, collection: &str) -> Result<usize, SyncError>;

    /// Apply every op or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), SyncError>;

    /// Backend name for logs.
    fn name(&self) -> &str {
        "store"
    }
}
