//! Request handlers. Each one is a thin shell over `SyncRunner` or
//! `Diagnostics`; all errors flow through [`ApiError`].

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use instasync_core::diagnostics::{ConnectionReport, DebugReport};
use instasync_core::store::ListQuery;
use instasync_core::{Campaign, SyncError, SyncReport, SyncStats};

use crate::auth;
use crate::envelope::{ApiError, Envelope};
use crate::AppState;

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

const DEFAULT_PAGE_LIMIT: usize = 50;
const MAX_PAGE_LIMIT: usize = 500;

pub async fn sync_all(State(state): State<AppState>) -> ApiResult<SyncReport> {
    let report = state.runner.sync_all().await?;
    let message = format!(
        "Synced {} documents ({} skipped)",
        report.written, report.skipped
    );
    Ok(Envelope::ok_with(report, message))
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignIdParam {
    #[serde(rename = "campaignId", alias = "campaign_id")]
    pub campaign_id: Option<String>,
}

/// `campaignId` from the query string, else from a JSON body.
pub async fn sync_campaign(
    State(state): State<AppState>,
    Query(query): Query<CampaignIdParam>,
    body: Option<Json<Value>>,
) -> ApiResult<SyncReport> {
    let from_body = body.and_then(|Json(v)| {
        v.get("campaignId")
            .or_else(|| v.get("campaign_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let id = query
        .campaign_id
        .filter(|id| !id.trim().is_empty())
        .or(from_body)
        .ok_or_else(|| SyncError::MissingParameter("campaignId".into()))?;

    let report = state.runner.sync_campaign_by_id(&id).await?;
    Ok(Envelope::ok_with(report, format!("Campaign {id} synced")))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CampaignPage {
    pub campaigns: Vec<Campaign>,
    pub page: usize,
    pub limit: usize,
    pub count: usize,
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<CampaignPage> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    let page = params.page.unwrap_or(1).max(1);
    let mut query = ListQuery::new().page(page, limit);
    if let Some(status) = params.status.filter(|s| !s.is_empty()) {
        query = query.filter("status", status);
    }

    let campaigns = state.runner.list_campaigns(&query).await?;
    Ok(Envelope::ok(CampaignPage {
        count: campaigns.len(),
        campaigns,
        page,
        limit,
    }))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Campaign> {
    Ok(Envelope::ok(state.runner.get_campaign(&id).await?))
}

pub async fn campaign_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    Ok(Envelope::ok(state.runner.campaign_metrics(&id).await?))
}

#[derive(Debug, Serialize)]
pub struct SubscriberList {
    #[serde(rename = "campaignId")]
    pub campaign_id: String,
    pub count: usize,
    pub subscribers: Vec<Value>,
}

pub async fn campaign_subscribers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SubscriberList> {
    let subscribers = state.runner.campaign_subscribers(&id).await?;
    Ok(Envelope::ok(SubscriberList {
        campaign_id: id,
        count: subscribers.len(),
        subscribers,
    }))
}

pub async fn test_connection(State(state): State<AppState>) -> ApiResult<ConnectionReport> {
    let report = state.diagnostics.test_connection().await?;
    let message = report.message.clone();
    Ok(Envelope::ok_with(report, message))
}

/// `endpoint` names the upstream path; every other query parameter is
/// forwarded.
pub async fn debug(
    State(state): State<AppState>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> ApiResult<DebugReport> {
    let endpoint = params
        .remove("endpoint")
        .ok_or_else(|| SyncError::MissingParameter("endpoint".into()))?;
    Ok(Envelope::ok(state.diagnostics.debug(&endpoint, params).await?))
}

pub async fn sync_stats(State(state): State<AppState>) -> ApiResult<SyncStats> {
    Ok(Envelope::ok(state.runner.stats().await?))
}

pub async fn callable_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<SyncReport> {
    auth::authorize(state.callable_token.as_deref(), &headers)?;
    let report = state.runner.sync_all().await?;
    Ok(Envelope::ok_with(report, "Sync completed"))
}
