//! In-crate test doubles for the API and store seams.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiResponse, InstantlyApi};
use crate::error::SyncError;
use crate::store::{merge_fields, Document, DocumentStore, ListQuery, WriteBatch, WriteOp};

/// Minimal atomic in-memory store that records commit sizes.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
    commits: Mutex<Vec<usize>>,
    attempts: Mutex<usize>,
    fail_on: Mutex<Option<usize>>,
}

impl MemoryStore {
    /// Make the `n`-th commit attempt (1-based) fail.
    pub fn fail_commit(&self, n: usize) {
        *self.fail_on.lock().unwrap() = Some(n);
    }

    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().unwrap().clone()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.data
            .lock()
            .unwrap()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, SyncError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), SyncError> {
        let mut batch = WriteBatch::new();
        batch.set(collection, id, data);
        self.commit(batch).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), SyncError> {
        let mut data = self.data.lock().unwrap();
        let doc = data
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| SyncError::NotFound(format!("{collection}/{id}")))?;
        merge_fields(doc, &fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, SyncError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .is_some())
    }

    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, SyncError> {
        let data = self.data.lock().unwrap();
        let docs = data.get(collection).into_iter().flatten().map(|(id, v)| Document {
            id: id.clone(),
            data: v.clone(),
        });
        Ok(query.apply(docs))
    }

    async fn count(&self, collection: &str) -> Result<usize, SyncError> {
        Ok(self.len(collection))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), SyncError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if *self.fail_on.lock().unwrap() == Some(attempt) {
            return Err(SyncError::Storage("injected commit failure".into()));
        }
        let size = batch.len();
        let mut data = self.data.lock().unwrap();
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { collection, id, data: doc } => {
                    data.entry(collection).or_default().insert(id, doc);
                }
                WriteOp::Update { collection, id, fields } => {
                    if let Some(doc) = data.get_mut(&collection).and_then(|c| c.get_mut(&id)) {
                        merge_fields(doc, &fields);
                    }
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(c) = data.get_mut(&collection) {
                        c.remove(&id);
                    }
                }
            }
        }
        self.commits.lock().unwrap().push(size);
        Ok(())
    }
}

/// Scripted upstream: canned list pages, detail bodies and metrics.
#[derive(Default)]
pub struct MockApi {
    pub campaign_pages: Mutex<VecDeque<Result<Value, SyncError>>>,
    pub lead_pages: Mutex<VecDeque<Result<Value, SyncError>>>,
    pub details: HashMap<String, Value>,
    pub metrics: HashMap<String, Value>,
    pub raw: Mutex<VecDeque<Result<ApiResponse, SyncError>>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn with_campaign_pages(self, pages: Vec<Value>) -> Self {
        *self.campaign_pages.lock().unwrap() = pages.into_iter().map(Ok).collect();
        self
    }

    pub fn with_lead_pages(self, pages: Vec<Value>) -> Self {
        *self.lead_pages.lock().unwrap() = pages.into_iter().map(Ok).collect();
        self
    }

    pub fn with_campaign(mut self, id: &str, detail: Value, metrics: Value) -> Self {
        self.details.insert(id.into(), detail);
        self.metrics.insert(id.into(), metrics);
        self
    }

    pub fn push_raw(&self, resp: Result<ApiResponse, SyncError>) {
        self.raw.lock().unwrap().push_back(resp);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next(queue: &Mutex<VecDeque<Result<Value, SyncError>>>) -> Result<Value, SyncError> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "items": [] })))
    }
}

#[async_trait]
impl InstantlyApi for MockApi {
    async fn list_campaigns(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("campaigns limit={limit} after={starting_after:?}"));
        Self::next(&self.campaign_pages)
    }

    async fn list_leads(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("leads limit={limit} after={starting_after:?}"));
        Self::next(&self.lead_pages)
    }

    async fn campaign(&self, id: &str) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push(format!("campaign {id}"));
        self.details
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("campaign {id}")))
    }

    async fn campaign_metrics(&self, id: &str) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push(format!("metrics {id}"));
        self.metrics
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("metrics for campaign {id}")))
    }

    async fn campaign_subscribers(
        &self,
        id: &str,
        _limit: u32,
        _starting_after: Option<&str>,
    ) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push(format!("subscribers {id}"));
        Ok(json!({ "items": [] }))
    }

    async fn raw_get(
        &self,
        path: &str,
        _query: &[(String, String)],
    ) -> Result<ApiResponse, SyncError> {
        self.calls.lock().unwrap().push(format!("raw {path}"));
        self.raw
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::new(200, json!({ "items": [] }))))
    }

    fn base_url(&self) -> &str {
        "http://mock"
    }
}
