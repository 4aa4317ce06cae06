//! Cursor-driven pagination.
//!
//! A [`PageSource`] fetches one page for a cursor; [`Paginator`] walks the
//! cursor chain until the upstream stops returning one. Pages are fetched
//! strictly one after another and any error aborts the walk.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;

use crate::api::InstantlyApi;
use crate::error::SyncError;
use crate::shape::{next_cursor, ShapeNormalizer};

/// One page of records plus the cursor for the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page following `cursor` (`None` for the first page).
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, SyncError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Which upstream list a [`ApiPageSource`] walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCollection {
    Campaigns,
    Leads,
    Subscribers { campaign_id: String },
}

/// [`PageSource`] backed by the upstream API.
pub struct ApiPageSource {
    api: Arc<dyn InstantlyApi>,
    collection: ApiCollection,
    limit: u32,
    shape: ShapeNormalizer,
    name: String,
}

impl ApiPageSource {
    pub fn new(api: Arc<dyn InstantlyApi>, collection: ApiCollection, limit: u32) -> Self {
        let name = match &collection {
            ApiCollection::Campaigns => "campaigns".to_string(),
            ApiCollection::Leads => "leads".to_string(),
            ApiCollection::Subscribers { campaign_id } => format!("subscribers:{campaign_id}"),
        };
        Self {
            api,
            collection,
            limit,
            shape: ShapeNormalizer::default(),
            name,
        }
    }
}

#[async_trait]
impl PageSource for ApiPageSource {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, SyncError> {
        let body = match &self.collection {
            ApiCollection::Campaigns => self.api.list_campaigns(self.limit, cursor).await?,
            ApiCollection::Leads => self.api.list_leads(self.limit, cursor).await?,
            ApiCollection::Subscribers { campaign_id } => {
                self.api
                    .campaign_subscribers(campaign_id, self.limit, cursor)
                    .await?
            }
        };
        Ok(Page {
            items: self.shape.extract(&body),
            next_cursor: next_cursor(&body),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

enum CursorState {
    Start,
    After(String),
    Done,
}

pub struct Paginator<S> {
    source: S,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Lazy stream of pages. Ends after the first page without a cursor.
    ///
    /// A page whose cursor equals the one just sent yields
    /// [`SyncError::Pagination`] instead of looping forever.
    pub fn pages(&self) -> impl Stream<Item = Result<Page, SyncError>> + '_ {
        let source = &self.source;
        stream::try_unfold(CursorState::Start, move |state| async move {
            let sent = match state {
                CursorState::Done => return Ok(None),
                CursorState::Start => None,
                CursorState::After(cursor) => Some(cursor),
            };

            let page = source.fetch_page(sent.as_deref()).await?;
            tracing::debug!(
                source = source.name(),
                cursor = ?sent,
                records = page.items.len(),
                next = ?page.next_cursor,
                "fetched page"
            );

            let next = match page.next_cursor.as_deref() {
                None | Some("") => CursorState::Done,
                Some(c) if sent.as_deref() == Some(c) => {
                    return Err(SyncError::Pagination(format!(
                        "{} returned cursor {c} twice in a row",
                        source.name()
                    )));
                }
                Some(c) => CursorState::After(c.to_string()),
            };
            Ok(Some((page, next)))
        })
    }

    /// Every record in upstream order. No partial results on error.
    pub async fn collect_all(&self) -> Result<Vec<Value>, SyncError> {
        let mut items = Vec::new();
        let mut pages = 0usize;
        let stream = self.pages();
        futures::pin_mut!(stream);
        while let Some(page) = stream.try_next().await? {
            pages += 1;
            items.extend(page.items);
        }
        tracing::info!(
            source = self.source.name(),
            pages,
            records = items.len(),
            "pagination complete"
        );
        Ok(items)
    }
}
