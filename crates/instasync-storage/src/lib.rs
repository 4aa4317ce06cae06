//! instasync-storage: document store backends for instasync.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (single-file persistence, `sqlite` feature)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use instasync_core::store::DocumentStore;
use instasync_core::SyncError;

pub use memory::InMemoryDocumentStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDocumentStore;

/// Open the store at `location`: `None` or `":memory:"` gives the in-memory
/// backend, anything else is a SQLite file path.
pub async fn open_store(location: Option<&str>) -> Result<Arc<dyn DocumentStore>, SyncError> {
    match location.map(str::trim).filter(|l| !l.is_empty()) {
        None | Some(":memory:") => {
            tracing::info!("using in-memory document store");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
        Some(path) => open_file(path).await,
    }
}

#[cfg(feature = "sqlite")]
async fn open_file(path: &str) -> Result<Arc<dyn DocumentStore>, SyncError> {
    tracing::info!(path, "using SQLite document store");
    Ok(Arc::new(SqliteDocumentStore::open(path).await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_file(path: &str) -> Result<Arc<dyn DocumentStore>, SyncError> {
    Err(SyncError::Config(format!(
        "store path '{path}' requires the `sqlite` feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_is_memory() {
        assert_eq!(open_store(None).await.unwrap().name(), "memory");
        assert_eq!(open_store(Some(":memory:")).await.unwrap().name(), "memory");
        assert_eq!(open_store(Some("  ")).await.unwrap().name(), "memory");
    }

    #[cfg(not(feature = "sqlite"))]
    #[tokio::test]
    async fn file_path_needs_sqlite() {
        assert!(matches!(
            open_store(Some("/tmp/instasync.db")).await,
            Err(SyncError::Config(_))
        ));
    }
}
