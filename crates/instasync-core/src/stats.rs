//! Aggregate views over synced documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;
use crate::sync::SyncReport;

/// Leads that showed each kind of engagement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub opened: usize,
    pub replied: usize,
    pub clicked: usize,
    pub unsubscribed: usize,
}

/// Breakdown of stored lead documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_campaign: BTreeMap<String, usize>,
    pub by_location: BTreeMap<String, usize>,
    pub engagement: Engagement,
}

impl LeadStats {
    pub fn from_documents<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut stats = Self::default();
        for doc in docs {
            stats.add(&doc.data);
        }
        stats
    }

    fn add(&mut self, lead: &Value) {
        self.total += 1;
        *self.by_status.entry(label(lead, "status")).or_default() += 1;
        *self.by_campaign.entry(label(lead, "campaign_id")).or_default() += 1;
        *self.by_location.entry(label(lead, "location")).or_default() += 1;

        let count = |field: &str| lead.get(field).and_then(Value::as_u64).unwrap_or(0);
        if count("email_open_count") > 0 {
            self.engagement.opened += 1;
        }
        if count("email_reply_count") > 0 {
            self.engagement.replied += 1;
        }
        if count("email_click_count") > 0 {
            self.engagement.clicked += 1;
        }
        if lead.get("status").and_then(Value::as_str) == Some("Unsubscribed") {
            self.engagement.unsubscribed += 1;
        }
    }
}

fn label(doc: &Value, field: &str) -> String {
    match doc.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "unknown".to_string(),
    }
}

/// Payload of the sync-stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStats {
    pub campaigns: usize,
    pub leads: LeadStats,
    pub last_sync: Option<SyncReport>,
    pub generated_at: DateTime<Utc>,
}
