use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{object_field, str_field, tags_field, u64_field, without_id};
use crate::error::SyncError;

/// A lead document. Status fields hold decoded labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub campaign_id: Option<String>,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: String,
    pub company: String,
    pub job_title: String,
    pub website: String,
    pub location: String,
    pub status: String,
    pub interest_status: String,
    pub verification_status: String,
    pub enrichment_status: String,
    pub esp: String,
    pub upload_method: String,
    pub email_open_count: u64,
    pub email_reply_count: u64,
    pub email_click_count: u64,
    pub custom_fields: Value,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl Lead {
    /// Build from a decoded upstream record.
    ///
    /// The identifier is the record's `id`, else its `email`. A record with
    /// neither cannot be keyed and is rejected.
    pub fn from_value(record: &Value) -> Result<Self, SyncError> {
        let email = str_field(record, &["email"]);
        let id = str_field(record, &["id"]).or_else(|| email.clone());
        if id.is_none() {
            return Err(SyncError::Decode("lead has neither id nor email".into()));
        }

        let first_name = str_field(record, &["first_name", "firstName"]).unwrap_or_default();
        let last_name = str_field(record, &["last_name", "lastName"]).unwrap_or_default();
        let full_name = str_field(record, &["full_name", "fullName", "name"])
            .unwrap_or_else(|| format!("{first_name} {last_name}").trim().to_string());

        Ok(Self {
            id,
            campaign_id: str_field(record, &["campaign", "campaign_id", "campaignId"]),
            email,
            full_name,
            first_name,
            last_name,
            phone: str_field(record, &["phone", "phoneNumber"]).unwrap_or_default(),
            company: str_field(record, &["company_name", "company", "companyName"])
                .unwrap_or_default(),
            job_title: str_field(record, &["job_title", "jobTitle", "title"]).unwrap_or_default(),
            website: str_field(record, &["website", "company_domain"]).unwrap_or_default(),
            location: str_field(record, &["location", "city", "country"]).unwrap_or_default(),
            status: str_field(record, &["status"]).unwrap_or_default(),
            interest_status: str_field(record, &["lt_interest_status"]).unwrap_or_default(),
            verification_status: str_field(record, &["verification_status"]).unwrap_or_default(),
            enrichment_status: str_field(record, &["enrichment_status"]).unwrap_or_default(),
            esp: str_field(record, &["esp_code"]).unwrap_or_default(),
            upload_method: str_field(record, &["upload_method"]).unwrap_or_default(),
            email_open_count: u64_field(record, &["email_open_count"]).unwrap_or(0),
            email_reply_count: u64_field(record, &["email_reply_count"]).unwrap_or(0),
            email_click_count: u64_field(record, &["email_click_count"]).unwrap_or(0),
            custom_fields: object_field(record, &["payload", "custom_fields", "customFields"]),
            tags: tags_field(record, "tags"),
            created_at: str_field(record, &["created_at", "timestamp_created"]),
            updated_at: str_field(record, &["updated_at", "timestamp_updated"]),
            last_synced_at: Utc::now(),
        })
    }

    /// Document key.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        without_id(self)
    }

    pub fn from_document(id: &str, doc: &Value) -> Result<Self, serde_json::Error> {
        let mut lead: Self = serde_json::from_value(doc.clone())?;
        lead.id = Some(id.to_string());
        Ok(lead)
    }
}
