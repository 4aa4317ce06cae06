use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{object_field, str_field, tags_field, u64_field, without_id};

/// Delivery and engagement counters for a campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignMetrics {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub unsubscribed: u64,
}

impl CampaignMetrics {
    /// Read counters from a metrics object, accepting the upstream's
    /// `*_count` spellings. Missing counters are zero.
    pub fn from_value(value: &Value) -> Self {
        Self {
            sent: u64_field(value, SENT).unwrap_or(0),
            delivered: u64_field(value, DELIVERED).unwrap_or(0),
            opened: u64_field(value, OPENED).unwrap_or(0),
            clicked: u64_field(value, CLICKED).unwrap_or(0),
            bounced: u64_field(value, BOUNCED).unwrap_or(0),
            unsubscribed: u64_field(value, UNSUBSCRIBED).unwrap_or(0),
        }
    }

    /// Does `value` carry at least one counter under a known spelling?
    pub fn carries_counters(value: &Value) -> bool {
        value.as_object().is_some_and(|map| {
            COUNTERS
                .iter()
                .flat_map(|keys| keys.iter())
                .any(|key| map.contains_key(*key))
        })
    }
}

const SENT: &[&str] = &["sent", "emails_sent_count", "sent_count"];
const DELIVERED: &[&str] = &["delivered", "delivered_count"];
const OPENED: &[&str] = &["opened", "open_count", "open_count_unique"];
const CLICKED: &[&str] = &["clicked", "link_click_count", "click_count"];
const BOUNCED: &[&str] = &["bounced", "bounced_count"];
const UNSUBSCRIBED: &[&str] = &["unsubscribed", "unsubscribed_count"];
const COUNTERS: [&[&str]; 6] = [SENT, DELIVERED, OPENED, CLICKED, BOUNCED, UNSUBSCRIBED];

/// A campaign document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Decoded status label; `"unknown"` when the record carried none.
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub scheduled_at: Option<String>,
    pub completed_at: Option<String>,
    pub subject: String,
    pub from_email: String,
    pub from_name: String,
    pub reply_to: String,
    pub template_id: Option<String>,
    pub list_id: Option<String>,
    pub metrics: CampaignMetrics,
    pub settings: Value,
    pub tags: Vec<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl Default for Campaign {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: String::new(),
            status: "unknown".into(),
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
            scheduled_at: None,
            completed_at: None,
            subject: String::new(),
            from_email: String::new(),
            from_name: String::new(),
            reply_to: String::new(),
            template_id: None,
            list_id: None,
            metrics: CampaignMetrics::default(),
            settings: Value::Object(Default::default()),
            tags: vec![],
            last_synced_at: now,
        }
    }
}

impl Campaign {
    /// Build from a decoded upstream record, filling defaults for anything
    /// missing.
    pub fn from_value(record: &Value) -> Self {
        let defaults = Self::default();
        let status = match record.get("status") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => defaults.status,
            Some(other) => other.to_string(),
        };
        Self {
            id: str_field(record, &["id"]),
            name: str_field(record, &["name"]).unwrap_or_default(),
            status,
            created_at: str_field(record, &["created_at", "timestamp_created"])
                .unwrap_or(defaults.created_at),
            updated_at: str_field(record, &["updated_at", "timestamp_updated"])
                .unwrap_or(defaults.updated_at),
            scheduled_at: str_field(record, &["scheduled_at"]),
            completed_at: str_field(record, &["completed_at"]),
            subject: str_field(record, &["subject"]).unwrap_or_default(),
            from_email: str_field(record, &["from_email"]).unwrap_or_default(),
            from_name: str_field(record, &["from_name"]).unwrap_or_default(),
            reply_to: str_field(record, &["reply_to"]).unwrap_or_default(),
            template_id: str_field(record, &["template_id"]),
            list_id: str_field(record, &["list_id"]),
            metrics: record
                .get("metrics")
                .filter(|m| m.is_object())
                .map(CampaignMetrics::from_value)
                .unwrap_or_default(),
            settings: object_field(record, &["settings", "campaign_schedule"]),
            tags: tags_field(record, "tags"),
            last_synced_at: defaults.last_synced_at,
        }
    }

    /// Storage form: every field except `id`.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        without_id(self)
    }

    /// Rebuild from a stored document and its key.
    pub fn from_document(id: &str, doc: &Value) -> Result<Self, serde_json::Error> {
        let mut campaign: Self = serde_json::from_value(doc.clone())?;
        campaign.id = Some(id.to_string());
        Ok(campaign)
    }
}
