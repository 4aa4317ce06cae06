//! instasync-core: the sync engine behind instasync.
//!
//! # Overview
//!
//! instasync mirrors campaigns and leads from the Instantly outreach API into
//! a document database. The core crate defines:
//!
//! - [`SyncConfig`]: immutable configuration handed to every component
//! - [`InstantlyApi`] / [`HttpTransport`]: the upstream API seam
//! - [`policy`] module: linear retry and request pacing
//! - [`Paginator`]: cursor-driven page accumulation
//! - [`RecordDecoder`] and the [`status`] tables: code → label decoding
//! - [`ShapeNormalizer`]: locates the record array in a response body
//! - [`DocumentStore`] / [`BatchWriter`]: storage seam and batched commits
//! - [`SyncRunner`]: the state machine tying it all together
//! - [`Diagnostics`]: connection test and raw-response inspection
//!
//! ```text
//! SyncRunner ──► Paginator ──► InstantlyClient ──► [RequestPacer] ──► HttpTransport
//!     │                             └── RetryPolicy (linear backoff)
//!     ├──► RecordDecoder ──► Campaign / Lead documents
//!     └──► BatchWriter ──► DocumentStore (≤ 500 docs per commit)
//! ```

pub mod api;
pub mod batch;
pub mod client;
pub mod config;
pub mod decode;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod paginate;
pub mod policy;
pub mod shape;
pub mod stats;
pub mod status;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiRequest, ApiResponse, HttpMethod, HttpTransport, InstantlyApi};
pub use batch::{BatchReport, BatchWriter};
pub use client::InstantlyClient;
pub use config::SyncConfig;
pub use decode::RecordDecoder;
pub use diagnostics::{ConnectionReport, DebugReport, Diagnostics};
pub use error::SyncError;
pub use model::{Campaign, CampaignMetrics, Lead};
pub use paginate::{ApiCollection, ApiPageSource, Page, PageSource, Paginator};
pub use shape::{ShapeNormalizer, ShapeSummary};
pub use store::{Document, DocumentStore, ListQuery, WriteBatch};
pub use stats::{LeadStats, SyncStats};
pub use sync::{SyncKind, SyncPhase, SyncReport, SyncRunner};
