//! End-to-end sync through `InstantlyClient` into the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use instasync_core::api::{ApiRequest, ApiResponse, HttpMethod, HttpTransport};
use instasync_core::store::{DocumentStore, ListQuery};
use instasync_core::{InstantlyClient, SyncConfig, SyncError, SyncPhase, SyncRunner};
use instasync_storage::InMemoryDocumentStore;

const LEADS: usize = 1200;
const PAGE: usize = 100;

/// Fake upstream: two campaign pages and `LEADS` leads in pages of `PAGE`.
/// The first lead request is answered with a 429.
#[derive(Default)]
struct FakeUpstream {
    lead_calls: AtomicUsize,
}

impl FakeUpstream {
    fn campaigns(&self, req: &ApiRequest) -> Value {
        let after = req
            .query
            .iter()
            .find(|(k, _)| k == "starting_after")
            .map(|(_, v)| v.as_str());
        match after {
            None => json!({
                "items": [{"id": "c1", "name": "One", "status": 1}],
                "next_starting_after": "c1"
            }),
            Some(_) => json!({"items": [{"id": "c2", "name": "Two", "status": 4}]}),
        }
    }

    fn leads(&self, req: &ApiRequest) -> ApiResponse {
        if self.lead_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return ApiResponse::new(429, json!({"error": "too many"}));
        }
        let body = req.body.clone().unwrap_or_default();
        let start = body["starting_after"]
            .as_str()
            .and_then(|c| c.strip_prefix("lead-"))
            .and_then(|n| n.parse::<usize>().ok())
            .map(|n| n + 1)
            .unwrap_or(0);
        let end = (start + PAGE).min(LEADS);
        let items: Vec<Value> = (start..end)
            .map(|i| {
                let campaign = if i % 2 == 0 { "c1" } else { "c2" };
                json!({
                    "id": format!("lead-{i}"),
                    "email": format!("lead{i}@example.com"),
                    "campaign": campaign,
                    "status": 1,
                    "verification_status": 1,
                })
            })
            .collect();
        let mut page = json!({ "items": items });
        if end < LEADS {
            page["next_starting_after"] = json!(format!("lead-{}", end - 1));
        }
        ApiResponse::new(200, page)
    }
}

struct Shared(Arc<FakeUpstream>);

#[async_trait]
impl HttpTransport for Shared {
    async fn execute(&self, req: &ApiRequest) -> Result<ApiResponse, SyncError> {
        match (req.method, req.path.as_str()) {
            (HttpMethod::Get, "/campaigns") => Ok(ApiResponse::new(200, self.0.campaigns(req))),
            (HttpMethod::Post, "/leads/list") => Ok(self.0.leads(req)),
            _ => Ok(ApiResponse::new(404, json!({"error": "no route"}))),
        }
    }

    fn base_url(&self) -> &str {
        "http://fake"
    }
}

fn runner() -> (SyncRunner, Arc<InMemoryDocumentStore>, Arc<FakeUpstream>) {
    let config = SyncConfig::builder()
        .api_key("k")
        .without_delays()
        .requests_per_minute(0)
        .page_size(PAGE as u32)
        .build()
        .unwrap();
    let upstream = Arc::new(FakeUpstream::default());
    let client = InstantlyClient::new(Shared(upstream.clone()), &config);
    let store = Arc::new(InMemoryDocumentStore::new());
    (
        SyncRunner::new(Arc::new(client), store.clone(), config),
        store,
        upstream,
    )
}

#[tokio::test]
async fn full_sync_writes_everything_in_capped_batches() {
    let (runner, store, upstream) = runner();

    let report = runner.sync_all().await.unwrap();
    assert_eq!(runner.phase(), SyncPhase::Done);
    assert_eq!(report.collections[0].written, 2);
    assert_eq!(report.collections[1].fetched, LEADS);
    assert_eq!(report.collections[1].written, LEADS);
    assert_eq!(report.collections[1].batches, 3);

    // 1 campaign commit + 3 lead commits (500, 500, 200).
    assert_eq!(store.commit_count(), 4);
    assert_eq!(store.count("leads").await.unwrap(), LEADS);

    // 12 pages plus the one 429 answered by the cooldown resend.
    assert_eq!(upstream.lead_calls.load(Ordering::SeqCst), 13);

    let lead = store.get("leads", "lead-7").await.unwrap().unwrap();
    assert_eq!(lead["status"], "Active");
    assert_eq!(lead["verification_status"], "Verified");
    assert_eq!(lead["campaign_id"], "c2");

    let campaign = runner.get_campaign("c2").await.unwrap();
    assert_eq!(campaign.status, "Running Subsequences");

    let stats = runner.stats().await.unwrap();
    assert_eq!(stats.campaigns, 2);
    assert_eq!(stats.leads.by_campaign["c1"], LEADS / 2);
    assert_eq!(stats.last_sync.unwrap().run_id, report.run_id);

    let first_page = runner
        .list_campaigns(&ListQuery::new().page(1, 1))
        .await
        .unwrap();
    assert_eq!(first_page.len(), 1);
    assert_eq!(first_page[0].id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn metrics_passthrough_maps_missing_campaign() {
    let (runner, _, _) = runner();
    let err = runner.campaign_metrics("zzz").await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}
