//! In-memory document store.
//!
//! Collections are `BTreeMap`s so listings come back ordered by id. A
//! commit validates every op before applying any of them, under one lock.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use instasync_core::store::{merge_fields, Document, DocumentStore, ListQuery, WriteBatch, WriteOp};
use instasync_core::SyncError;

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// In-memory document store. All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<Collections>,
    commits: Mutex<u64>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        *self.commits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn missing(collection: &str, id: &str) -> SyncError {
    SyncError::NotFound(format!("{collection}/{id}"))
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, SyncError> {
        Ok(self.lock().get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), SyncError> {
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), SyncError> {
        let mut collections = self.lock();
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| missing(collection, id))?;
        merge_fields(doc, &fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, SyncError> {
        Ok(self
            .lock()
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .is_some())
    }

    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, SyncError> {
        let collections = self.lock();
        let docs = collections
            .get(collection)
            .into_iter()
            .flatten()
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            });
        Ok(query.apply(docs))
    }

    async fn count(&self, collection: &str) -> Result<usize, SyncError> {
        Ok(self.lock().get(collection).map(BTreeMap::len).unwrap_or(0))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), SyncError> {
        let mut collections = self.lock();

        // Updates need their target to exist, counting sets earlier in the batch.
        let mut created: Vec<(&str, &str)> = vec![];
        for op in batch.ops() {
            match op {
                WriteOp::Set { collection, id, .. } => {
                    created.push((collection.as_str(), id.as_str()))
                }
                WriteOp::Update { collection, id, .. } => {
                    let exists = collections
                        .get(collection)
                        .is_some_and(|c| c.contains_key(id))
                        || created.contains(&(collection.as_str(), id.as_str()));
                    if !exists {
                        return Err(missing(collection, id));
                    }
                }
                WriteOp::Delete { .. } => {}
            }
        }

        let ops = batch.len();
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { collection, id, data } => {
                    collections.entry(collection).or_default().insert(id, data);
                }
                WriteOp::Update { collection, id, fields } => {
                    if let Some(doc) = collections.get_mut(&collection).and_then(|c| c.get_mut(&id)) {
                        merge_fields(doc, &fields);
                    }
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(c) = collections.get_mut(&collection) {
                        c.remove(&id);
                    }
                }
            }
        }
        drop(collections);

        *self.commits.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        tracing::debug!(ops, "memory batch committed");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_update_delete() {
        let store = InMemoryDocumentStore::new();
        store.set("campaigns", "c1", json!({"name": "A", "status": "Active"})).await.unwrap();
        store.update("campaigns", "c1", json!({"status": "Paused"})).await.unwrap();

        let doc = store.get("campaigns", "c1").await.unwrap().unwrap();
        assert_eq!(doc, json!({"name": "A", "status": "Paused"}));

        assert!(store.delete("campaigns", "c1").await.unwrap());
        assert!(!store.delete("campaigns", "c1").await.unwrap());
        assert!(store.get("campaigns", "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.update("c", "nope", json!({})).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let store = InMemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        batch
            .set("leads", "a", json!({"n": 1}))
            .update("leads", "ghost", json!({"n": 2}));

        assert!(store.commit(batch).await.is_err());
        assert_eq!(store.count("leads").await.unwrap(), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn update_may_follow_set_in_same_batch() {
        let store = InMemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        batch
            .set("leads", "a", json!({"n": 1}))
            .update("leads", "a", json!({"m": 2}));
        store.commit(batch).await.unwrap();
        assert_eq!(
            store.get("leads", "a").await.unwrap().unwrap(),
            json!({"n": 1, "m": 2})
        );
    }

    #[tokio::test]
    async fn list_is_ordered_filtered_and_paged() {
        let store = InMemoryDocumentStore::new();
        for (id, status) in [("c", "Active"), ("a", "Active"), ("b", "Paused"), ("d", "Active")] {
            store.set("campaigns", id, json!({ "status": status })).await.unwrap();
        }

        let all = store.list("campaigns", &ListQuery::new()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);

        let page = store
            .list("campaigns", &ListQuery::new().filter("status", "Active").page(1, 2))
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
