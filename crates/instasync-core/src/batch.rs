//! Batched document writes.
//!
//! Documents are split into consecutive groups of at most `batch_size` and
//! each group is committed atomically, in order, one at a time. A failed
//! commit stops the writer; groups committed before it stay committed.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::MAX_BATCH_SIZE;
use crate::error::SyncError;
use crate::store::{DocumentStore, WriteBatch};

/// Outcome of a successful [`BatchWriter::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub written: usize,
    pub batches: usize,
    /// Document count of each committed batch, in commit order.
    pub sizes: Vec<usize>,
}

pub struct BatchWriter {
    store: Arc<dyn DocumentStore>,
    batch_size: usize,
}

impl BatchWriter {
    /// `batch_size` is clamped to `1..=500`.
    pub fn new(store: Arc<dyn DocumentStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of commits needed for `docs` documents.
    pub fn batch_count(&self, docs: usize) -> usize {
        docs.div_ceil(self.batch_size)
    }

    pub async fn write(
        &self,
        collection: &str,
        docs: Vec<(String, Value)>,
    ) -> Result<BatchReport, SyncError> {
        self.write_with(collection, docs, |_, _| {}).await
    }

    /// Like [`write`](Self::write), calling `on_batch(i, n)` before the
    /// `i`-th of `n` commits (1-based).
    pub async fn write_with<F>(
        &self,
        collection: &str,
        docs: Vec<(String, Value)>,
        mut on_batch: F,
    ) -> Result<BatchReport, SyncError>
    where
        F: FnMut(usize, usize) + Send,
    {
        let total = self.batch_count(docs.len());
        let mut report = BatchReport::default();

        for (idx, chunk) in docs.chunks(self.batch_size).enumerate() {
            let number = idx + 1;
            on_batch(number, total);

            let mut batch = WriteBatch::new();
            for (id, data) in chunk {
                batch.set(collection, id, data.clone());
            }

            if let Err(e) = self.store.commit(batch).await {
                tracing::error!(
                    collection,
                    batch = number,
                    of = total,
                    committed = report.batches,
                    error = %e,
                    "batch commit failed"
                );
                return Err(SyncError::BatchCommit {
                    batch: number,
                    committed: report.batches,
                    reason: e.to_string(),
                });
            }

            report.batches += 1;
            report.written += chunk.len();
            report.sizes.push(chunk.len());
            tracing::info!(
                collection,
                batch = number,
                of = total,
                size = chunk.len(),
                "batch committed"
            );
        }

        Ok(report)
    }
}
