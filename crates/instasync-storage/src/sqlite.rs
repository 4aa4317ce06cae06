//! SQLite document store.
//!
//! Every collection shares one `documents` table keyed by
//! `(collection, id)`; document bodies are stored as JSON text. Batch
//! commits run inside a single transaction.
//!
//! # Usage
//! ```rust,no_run
//! use instasync_storage::sqlite::SqliteDocumentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteDocumentStore::open("./instasync.db").await?;
//! let scratch = SqliteDocumentStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use instasync_core::store::{merge_fields, Document, DocumentStore, ListQuery, WriteBatch, WriteOp};
use instasync_core::SyncError;

fn storage_err(e: impl std::fmt::Display) -> SyncError {
    SyncError::Storage(e.to_string())
}

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Open (or create) a database at `path`, either a file path or a full
    /// `sqlite:` URL.
    pub async fn open(path: &str) -> Result<Self, SyncError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Private in-memory database. One connection, so every query sees the
    /// same database.
    pub async fn in_memory() -> Result<Self, SyncError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), SyncError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT    NOT NULL,
                id         TEXT    NOT NULL,
                data       TEXT    NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn upsert(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<(), SyncError> {
        let body = serde_json::to_string(data)?;
        sqlx::query(
            "INSERT OR REPLACE INTO documents (collection, id, data, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(id)
        .bind(&body)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut **tx)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn fetch_in(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, SyncError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(storage_err)?;
        row.map(|r| parse(r.get("data"))).transpose()
    }

    async fn apply(tx: &mut Transaction<'_, Sqlite>, op: WriteOp) -> Result<(), SyncError> {
        match op {
            WriteOp::Set { collection, id, data } => {
                Self::upsert(tx, &collection, &id, &data).await
            }
            WriteOp::Update { collection, id, fields } => {
                let mut doc = Self::fetch_in(tx, &collection, &id)
                    .await?
                    .ok_or_else(|| SyncError::NotFound(format!("{collection}/{id}")))?;
                merge_fields(&mut doc, &fields);
                Self::upsert(tx, &collection, &id, &doc).await
            }
            WriteOp::Delete { collection, id } => {
                sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                    .bind(&collection)
                    .bind(&id)
                    .execute(&mut **tx)
                    .await
                    .map_err(storage_err)?;
                Ok(())
            }
        }
    }
}

fn parse(text: String) -> Result<Value, SyncError> {
    serde_json::from_str(&text).map_err(|e| SyncError::Decode(format!("stored document: {e}")))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, SyncError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(|r| parse(r.get("data"))).transpose()
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), SyncError> {
        let mut batch = WriteBatch::new();
        batch.set(collection, id, data);
        self.commit(batch).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), SyncError> {
        let mut batch = WriteBatch::new();
        batch.update(collection, id, fields);
        self.commit(batch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, SyncError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Document>, SyncError> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push(Document {
                id: row.get("id"),
                data: parse(row.get("data"))?,
            });
        }
        Ok(query.apply(docs))
    }

    async fn count(&self, collection: &str) -> Result<usize, SyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as usize)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), SyncError> {
        let ops = batch.len();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        for op in batch.into_ops() {
            // Dropping `tx` on error rolls the whole batch back.
            Self::apply(&mut tx, op).await?;
        }
        tx.commit().await.map_err(storage_err)?;
        debug!(ops, "sqlite batch committed");
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
