//! `SyncRunner`: fetch, decode and store campaigns and leads.
//!
//! Each run moves through
//! `Start → Fetching(cursor) → … → Decoding → Writing(i of n) → Done`, or
//! lands in `Failed` on the first fetch or write error. Records that cannot
//! be turned into documents are logged and counted as skipped; they never
//! fail the run.
//!
//! At most one run is active per runner. A second trigger while a run holds
//! the lock fails immediately with [`SyncError::AlreadyRunning`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::api::InstantlyApi;
use crate::batch::{BatchReport, BatchWriter};
use crate::config::SyncConfig;
use crate::decode::RecordDecoder;
use crate::error::SyncError;
use crate::model::{Campaign, CampaignMetrics, Lead};
use crate::paginate::{ApiCollection, ApiPageSource, PageSource, Paginator};
use crate::stats::{LeadStats, SyncStats};
use crate::store::{DocumentStore, ListQuery};

/// Document id of the last run record inside the system collection.
pub const LAST_SYNC_DOC: &str = "last_sync";

/// What a run synchronises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncKind {
    Campaigns,
    Leads,
    Full,
    Campaign(String),
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Campaigns => write!(f, "campaigns"),
            Self::Leads => write!(f, "leads"),
            Self::Full => write!(f, "full"),
            Self::Campaign(id) => write!(f, "campaign:{id}"),
        }
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Start,
    Fetching {
        collection: String,
        cursor: Option<String>,
    },
    Decoding {
        collection: String,
    },
    Writing {
        collection: String,
        batch: usize,
        of: usize,
    },
    Done,
    Failed,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Per-collection counters within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub collection: String,
    pub fetched: usize,
    pub written: usize,
    pub skipped: usize,
    pub batches: usize,
}

/// Record of one sync run. The latest one is persisted as
/// `system/last_sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub phase: SyncPhase,
    pub fetched: usize,
    pub written: usize,
    pub skipped: usize,
    pub batches: usize,
    pub error: Option<String>,
    pub collections: Vec<CollectionReport>,
}

impl SyncReport {
    fn start(kind: &SyncKind) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            phase: SyncPhase::Start,
            fetched: 0,
            written: 0,
            skipped: 0,
            batches: 0,
            error: None,
            collections: vec![],
        }
    }

    fn record(&mut self, stage: CollectionReport) {
        self.fetched += stage.fetched;
        self.written += stage.written;
        self.skipped += stage.skipped;
        self.batches += stage.batches;
        self.collections.push(stage);
    }

    pub fn is_success(&self) -> bool {
        self.phase == SyncPhase::Done
    }
}

pub struct SyncRunner {
    api: Arc<dyn InstantlyApi>,
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
    campaign_decoder: RecordDecoder,
    lead_decoder: RecordDecoder,
    run_lock: AsyncMutex<()>,
    phase: Mutex<SyncPhase>,
}

impl SyncRunner {
    pub fn new(api: Arc<dyn InstantlyApi>, store: Arc<dyn DocumentStore>, config: SyncConfig) -> Self {
        Self {
            api,
            store,
            config,
            campaign_decoder: RecordDecoder::campaigns(),
            lead_decoder: RecordDecoder::leads(),
            run_lock: AsyncMutex::new(()),
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    pub fn api(&self) -> &Arc<dyn InstantlyApi> {
        &self.api
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Phase of the current (or last) run.
    pub fn phase(&self) -> SyncPhase {
        self.phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    fn set_phase(&self, phase: SyncPhase) {
        tracing::debug!(phase = ?phase, "sync phase");
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn acquire(&self) -> Result<AsyncMutexGuard<'_, ()>, SyncError> {
        self.run_lock.try_lock().map_err(|_| {
            tracing::warn!("sync trigger rejected, a run is already in progress");
            SyncError::AlreadyRunning
        })
    }

    // ─── Sync operations ──────────────────────────────────────────────────────

    pub async fn sync_campaigns(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.acquire()?;
        let mut report = self.begin(SyncKind::Campaigns);
        let outcome = self.pull_campaigns(&mut report).await;
        self.finish(report, outcome).await
    }

    pub async fn sync_leads(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.acquire()?;
        let mut report = self.begin(SyncKind::Leads);
        let outcome = self.pull_leads(&mut report).await;
        self.finish(report, outcome).await
    }

    /// Campaigns, then leads. A campaign failure skips the lead phase.
    pub async fn sync_all(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.acquire()?;
        let mut report = self.begin(SyncKind::Full);
        let outcome = match self.pull_campaigns(&mut report).await {
            Ok(()) => self.pull_leads(&mut report).await,
            Err(e) => Err(e),
        };
        self.finish(report, outcome).await
    }

    /// Fetch one campaign and its metrics and store it.
    ///
    /// Metrics come from the metrics response's `metrics` property, else
    /// from the body itself when it carries counters. Without either the
    /// campaign keeps its own counters.
    pub async fn sync_campaign_by_id(&self, id: &str) -> Result<SyncReport, SyncError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SyncError::MissingParameter("campaignId".into()));
        }
        let _guard = self.acquire()?;
        let mut report = self.begin(SyncKind::Campaign(id.to_string()));
        let outcome = self.pull_one_campaign(id, &mut report).await;
        self.finish(report, outcome).await
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    /// Stored campaigns, ordered by id.
    pub async fn list_campaigns(&self, query: &ListQuery) -> Result<Vec<Campaign>, SyncError> {
        let docs = self
            .store
            .list(&self.config.collections.campaigns, query)
            .await?;
        docs.iter()
            .map(|d| Campaign::from_document(&d.id, &d.data).map_err(SyncError::from))
            .collect()
    }

    pub async fn get_campaign(&self, id: &str) -> Result<Campaign, SyncError> {
        let doc = self
            .store
            .get(&self.config.collections.campaigns, id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("campaign {id}")))?;
        Ok(Campaign::from_document(id, &doc)?)
    }

    /// Live metrics straight from the upstream.
    pub async fn campaign_metrics(&self, id: &str) -> Result<Value, SyncError> {
        self.api.campaign_metrics(id).await
    }

    /// Every subscriber of a campaign, paged straight from the upstream.
    pub async fn campaign_subscribers(&self, id: &str) -> Result<Vec<Value>, SyncError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SyncError::MissingParameter("campaignId".into()));
        }
        let paginator = Paginator::new(ApiPageSource::new(
            self.api.clone(),
            ApiCollection::Subscribers {
                campaign_id: id.to_string(),
            },
            self.config.page_size,
        ));
        paginator.collect_all().await
    }

    /// Stored leads, optionally restricted to one campaign.
    pub async fn lead_stats(&self, campaign_id: Option<&str>) -> Result<LeadStats, SyncError> {
        let query = match campaign_id {
            Some(cid) => ListQuery::new().filter("campaign_id", cid),
            None => ListQuery::new(),
        };
        let docs = self.store.list(&self.config.collections.leads, &query).await?;
        Ok(LeadStats::from_documents(&docs))
    }

    pub async fn last_run(&self) -> Result<Option<SyncReport>, SyncError> {
        match self
            .store
            .get(&self.config.collections.system, LAST_SYNC_DOC)
            .await?
        {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn stats(&self) -> Result<SyncStats, SyncError> {
        Ok(SyncStats {
            campaigns: self.store.count(&self.config.collections.campaigns).await?,
            leads: self.lead_stats(None).await?,
            last_sync: self.last_run().await?,
            generated_at: Utc::now(),
        })
    }

    // ─── Run internals ────────────────────────────────────────────────────────

    fn begin(&self, kind: SyncKind) -> SyncReport {
        let report = SyncReport::start(&kind);
        tracing::info!(run_id = %report.run_id, kind = %kind, "sync run started");
        self.set_phase(SyncPhase::Start);
        report
    }

    async fn finish(
        &self,
        mut report: SyncReport,
        outcome: Result<(), SyncError>,
    ) -> Result<SyncReport, SyncError> {
        report.finished_at = Some(Utc::now());
        report.phase = match &outcome {
            Ok(()) => SyncPhase::Done,
            Err(_) => SyncPhase::Failed,
        };
        report.error = outcome.as_ref().err().map(ToString::to_string);
        self.set_phase(report.phase.clone());

        match &outcome {
            Ok(()) => tracing::info!(
                run_id = %report.run_id,
                kind = %report.kind,
                fetched = report.fetched,
                written = report.written,
                skipped = report.skipped,
                batches = report.batches,
                "sync run finished"
            ),
            Err(e) => tracing::error!(
                run_id = %report.run_id,
                kind = %report.kind,
                written = report.written,
                error = %e,
                "sync run failed"
            ),
        }

        if let Err(e) = self.save_run(&report).await {
            tracing::warn!(run_id = %report.run_id, error = %e, "could not store run record");
        }

        outcome.map(|()| report)
    }

    async fn save_run(&self, report: &SyncReport) -> Result<(), SyncError> {
        let doc = serde_json::to_value(report)?;
        self.store
            .set(&self.config.collections.system, LAST_SYNC_DOC, doc)
            .await
    }

    async fn fetch_all(&self, collection: ApiCollection) -> Result<Vec<Value>, SyncError> {
        let paginator = Paginator::new(ApiPageSource::new(
            self.api.clone(),
            collection,
            self.config.page_size,
        ));
        let name = paginator.source().name().to_string();
        self.set_phase(SyncPhase::Fetching {
            collection: name.clone(),
            cursor: None,
        });

        let mut records = Vec::new();
        let pages = paginator.pages();
        futures::pin_mut!(pages);
        while let Some(page) = pages.try_next().await? {
            records.extend(page.items);
            if page.next_cursor.is_some() {
                self.set_phase(SyncPhase::Fetching {
                    collection: name.clone(),
                    cursor: page.next_cursor,
                });
            }
        }
        tracing::info!(collection = %name, records = records.len(), "fetched all pages");
        Ok(records)
    }

    async fn write(
        &self,
        collection: &str,
        docs: Vec<(String, Value)>,
        stage: &mut CollectionReport,
    ) -> Result<(), SyncError> {
        let writer = BatchWriter::new(self.store.clone(), self.config.batch_size);
        let total_docs = docs.len();
        let result = writer
            .write_with(collection, docs, |batch, of| {
                self.set_phase(SyncPhase::Writing {
                    collection: collection.to_string(),
                    batch,
                    of,
                })
            })
            .await;
        match result {
            Ok(BatchReport { written, batches, .. }) => {
                stage.written = written;
                stage.batches = batches;
                Ok(())
            }
            Err(e) => {
                if let SyncError::BatchCommit { committed, .. } = &e {
                    stage.batches = *committed;
                    stage.written = (committed * writer.batch_size()).min(total_docs);
                }
                Err(e)
            }
        }
    }

    async fn pull_campaigns(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let collection = self.config.collections.campaigns.clone();
        let records = self.fetch_all(ApiCollection::Campaigns).await?;

        self.set_phase(SyncPhase::Decoding {
            collection: collection.clone(),
        });
        let mut stage = CollectionReport {
            collection: collection.clone(),
            fetched: records.len(),
            ..Default::default()
        };
        let mut docs = Vec::with_capacity(records.len());
        for (idx, raw) in records.iter().enumerate() {
            let campaign = Campaign::from_value(&self.campaign_decoder.decode(raw));
            let Some(id) = campaign.id.clone() else {
                tracing::warn!(index = idx, "skipping campaign without id");
                stage.skipped += 1;
                continue;
            };
            docs.push((id, campaign.to_document()?));
        }

        let outcome = self.write(&collection, docs, &mut stage).await;
        report.record(stage);
        outcome
    }

    async fn pull_leads(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let collection = self.config.collections.leads.clone();
        let records = self.fetch_all(ApiCollection::Leads).await?;

        self.set_phase(SyncPhase::Decoding {
            collection: collection.clone(),
        });
        let mut stage = CollectionReport {
            collection: collection.clone(),
            fetched: records.len(),
            ..Default::default()
        };
        let mut docs = Vec::with_capacity(records.len());
        for (idx, raw) in records.iter().enumerate() {
            match Lead::from_value(&self.lead_decoder.decode(raw)) {
                Ok(lead) => docs.push((lead.key().to_string(), lead.to_document()?)),
                Err(e) => {
                    tracing::warn!(index = idx, error = %e, "skipping lead");
                    stage.skipped += 1;
                }
            }
        }

        let outcome = self.write(&collection, docs, &mut stage).await;
        report.record(stage);
        outcome
    }

    async fn pull_one_campaign(&self, id: &str, report: &mut SyncReport) -> Result<(), SyncError> {
        let collection = self.config.collections.campaigns.clone();
        self.set_phase(SyncPhase::Fetching {
            collection: collection.clone(),
            cursor: None,
        });
        let detail = self.api.campaign(id).await?;
        let metrics = self.api.campaign_metrics(id).await?;

        self.set_phase(SyncPhase::Decoding {
            collection: collection.clone(),
        });
        let mut campaign = Campaign::from_value(&self.campaign_decoder.decode(&detail));
        if let Some(m) = metrics_object(&metrics) {
            campaign.metrics = CampaignMetrics::from_value(m);
        }
        let key = campaign.id.clone().unwrap_or_else(|| id.to_string());

        let mut stage = CollectionReport {
            collection: collection.clone(),
            fetched: 1,
            ..Default::default()
        };
        let outcome = self
            .write(&collection, vec![(key, campaign.to_document()?)], &mut stage)
            .await;
        report.record(stage);
        outcome
    }
}

fn metrics_object(body: &Value) -> Option<&Value> {
    match body.get("metrics") {
        Some(m) if m.is_object() => Some(m),
        _ => CampaignMetrics::carries_counters(body).then_some(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, MockApi};
    use serde_json::json;

    fn config() -> SyncConfig {
        SyncConfig::builder()
            .api_key("test")
            .without_delays()
            .build()
            .unwrap()
    }

    fn runner(api: MockApi) -> (SyncRunner, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let runner = SyncRunner::new(Arc::new(api), store.clone(), config());
        (runner, store)
    }

    #[tokio::test]
    async fn campaigns_are_decoded_and_stored() {
        let api = MockApi::default().with_campaign_pages(vec![
            json!({"items": [{"id": "c1", "name": "A", "status": 1}], "next_starting_after": "c1"}),
            json!({"items": [{"id": "c2", "name": "B", "status": -2}, {"name": "no id"}]}),
        ]);
        let (runner, store) = runner(api);

        let report = runner.sync_campaigns().await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.fetched, 3);
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.batches, 1);
        assert_eq!(runner.phase(), SyncPhase::Done);

        let c2 = store.get("campaigns", "c2").await.unwrap().unwrap();
        assert_eq!(c2["status"], "Bounce Protect");
        assert!(c2.get("id").is_none());

        let last = runner.last_run().await.unwrap().unwrap();
        assert_eq!(last.run_id, report.run_id);
        assert_eq!(last.kind, "campaigns");
    }

    #[tokio::test]
    async fn leads_keyed_by_id_or_email_and_unkeyed_skipped() {
        let api = MockApi::default().with_lead_pages(vec![json!({"items": [
            {"id": "l1", "email": "a@x.io", "status": 1, "esp_code": 2},
            {"email": "b@x.io", "lt_interest_status": 1},
            {"first_name": "ghost"},
        ]})]);
        let (runner, store) = runner(api);

        let report = runner.sync_leads().await.unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 1);

        let l1 = store.get("leads", "l1").await.unwrap().unwrap();
        assert_eq!(l1["status"], "Active");
        assert_eq!(l1["esp"], "Microsoft");
        let b = store.get("leads", "b@x.io").await.unwrap().unwrap();
        assert_eq!(b["interest_status"], "Interested");
    }

    #[tokio::test]
    async fn fetch_failure_marks_run_failed() {
        let api = MockApi::default();
        api.campaign_pages
            .lock()
            .unwrap()
            .push_back(Err(SyncError::Transport("refused".into())));
        let (runner, store) = runner(api);

        let err = runner.sync_all().await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert_eq!(runner.phase(), SyncPhase::Failed);
        assert_eq!(store.len("campaigns"), 0);

        let last = runner.last_run().await.unwrap().unwrap();
        assert_eq!(last.phase, SyncPhase::Failed);
        assert!(last.error.unwrap().contains("refused"));
        assert!(runner.api().base_url().starts_with("http"));
    }

    #[tokio::test]
    async fn sync_all_runs_campaigns_then_leads() {
        let api = MockApi::default()
            .with_campaign_pages(vec![json!([{"id": "c1", "status": 3}])])
            .with_lead_pages(vec![json!({"items": [{"id": "l1", "campaign": "c1"}]})]);
        let (runner, _store) = runner(api);

        let report = runner.sync_all().await.unwrap();
        assert_eq!(report.kind, "full");
        assert_eq!(report.collections.len(), 2);
        assert_eq!(report.collections[0].collection, "campaigns");
        assert_eq!(report.collections[1].collection, "leads");
        assert_eq!(report.written, 2);
    }

    #[tokio::test]
    async fn single_campaign_takes_metrics_from_metrics_endpoint() {
        let api = MockApi::default().with_campaign(
            "c7",
            json!({"id": "c7", "name": "Seven", "status": 2, "metrics": {"sent": 1}}),
            json!({"metrics": {"sent": 40, "opened": 12}}),
        );
        let (runner, store) = runner(api);

        let report = runner.sync_campaign_by_id("c7").await.unwrap();
        assert_eq!(report.kind, "campaign:c7");
        assert_eq!(report.written, 1);

        let stored = runner.get_campaign("c7").await.unwrap();
        assert_eq!(stored.status, "Paused");
        assert_eq!(stored.metrics.sent, 40);
        assert_eq!(stored.metrics.opened, 12);
        assert_eq!(store.commit_sizes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn bare_metrics_body_is_used_directly() {
        let api = MockApi::default().with_campaign("c8", json!({"id": "c8"}), json!({"sent": 5}));
        let (runner, _) = runner(api);
        runner.sync_campaign_by_id("c8").await.unwrap();
        assert_eq!(runner.get_campaign("c8").await.unwrap().metrics.sent, 5);
    }

    #[tokio::test]
    async fn unrelated_metrics_body_keeps_campaign_counters() {
        let api = MockApi::default().with_campaign(
            "c5",
            json!({"id": "c5", "metrics": {"sent": 9, "opened": 3}}),
            json!({"campaign_id": "c5"}),
        );
        let (runner, _) = runner(api);
        runner.sync_campaign_by_id("c5").await.unwrap();

        let stored = runner.get_campaign("c5").await.unwrap();
        assert_eq!(stored.metrics.sent, 9);
        assert_eq!(stored.metrics.opened, 3);
    }

    #[tokio::test]
    async fn missing_campaign_id_is_rejected() {
        let (runner, _) = runner(MockApi::default());
        let err = runner.sync_campaign_by_id("  ").await.unwrap_err();
        assert!(matches!(err, SyncError::MissingParameter(_)));
    }

    #[tokio::test]
    async fn unknown_campaign_is_not_found() {
        let (runner, _) = runner(MockApi::default());
        assert!(matches!(
            runner.sync_campaign_by_id("nope").await.unwrap_err(),
            SyncError::NotFound(_)
        ));
        assert!(matches!(
            runner.get_campaign("nope").await.unwrap_err(),
            SyncError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn second_trigger_while_running_is_rejected() {
        let (runner, _) = runner(MockApi::default());
        let _held = runner.acquire().unwrap();
        assert!(runner.is_running());
        assert!(matches!(
            runner.sync_all().await.unwrap_err(),
            SyncError::AlreadyRunning
        ));
    }

    #[tokio::test]
    async fn list_and_stats_read_from_storage() {
        let api = MockApi::default()
            .with_campaign_pages(vec![json!({"data": [
                {"id": "a", "status": 1},
                {"id": "b", "status": 2},
                {"id": "c", "status": 1},
            ]})])
            .with_lead_pages(vec![json!({"items": [
                {"id": "l1", "campaign": "a", "status": 1, "email_open_count": 1},
                {"id": "l2", "campaign": "a", "status": -2},
            ]})]);
        let (runner, _) = runner(api);
        runner.sync_all().await.unwrap();

        let active = runner
            .list_campaigns(&ListQuery::new().filter("status", "Active"))
            .await
            .unwrap();
        let ids: Vec<_> = active.iter().filter_map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let stats = runner.stats().await.unwrap();
        assert_eq!(stats.campaigns, 3);
        assert_eq!(stats.leads.total, 2);
        assert_eq!(stats.leads.engagement.opened, 1);
        assert_eq!(stats.leads.engagement.unsubscribed, 1);
        assert_eq!(stats.last_sync.unwrap().kind, "full");

        let for_a = runner.lead_stats(Some("a")).await.unwrap();
        assert_eq!(for_a.total, 2);
    }

    #[tokio::test]
    async fn subscribers_come_from_the_upstream() {
        let (runner, _) = runner(MockApi::default());
        assert!(runner.campaign_subscribers("c1").await.unwrap().is_empty());
        assert!(matches!(
            runner.campaign_subscribers(" ").await.unwrap_err(),
            SyncError::MissingParameter(_)
        ));
    }
}
