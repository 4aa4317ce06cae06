//! The upstream API seam.
//!
//! [`HttpTransport`] is the raw wire: one request in, one response out, no
//! policy. [`InstantlyApi`] is the typed surface the sync runner talks to;
//! [`crate::InstantlyClient`] implements it on top of any transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// HTTP verbs used against the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A request relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: vec![],
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: vec![],
            body: Some(body),
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// A raw upstream response. Non-JSON bodies are carried as a JSON string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: vec![],
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Convert a non-success response into [`SyncError::Http`].
    pub fn into_result(self) -> Result<Value, SyncError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            let body = match self.body {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Err(SyncError::Http {
                status: self.status,
                body,
            })
        }
    }
}

/// Raw HTTP wire. Implementations return `Ok` for every HTTP status and
/// `Err(SyncError::Transport)` only when no response arrived.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn execute(&self, req: &ApiRequest) -> Result<ApiResponse, SyncError>;

    /// Base URL requests are resolved against.
    fn base_url(&self) -> &str;
}

/// The typed upstream API used by the sync runner and the handlers.
#[async_trait]
pub trait InstantlyApi: Send + Sync + 'static {
    /// `GET /campaigns?limit&starting_after`
    async fn list_campaigns(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError>;

    /// `POST /leads/list` with `{limit, starting_after}`
    async fn list_leads(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError>;

    /// `GET /campaigns/{id}`
    async fn campaign(&self, id: &str) -> Result<Value, SyncError>;

    /// `GET /campaigns/{id}/metrics`
    async fn campaign_metrics(&self, id: &str) -> Result<Value, SyncError>;

    /// `GET /campaigns/{id}/subscribers`
    async fn campaign_subscribers(
        &self,
        id: &str,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError>;

    /// Unchecked `GET` used by diagnostics: any status is returned as-is and
    /// the generic retry helper is bypassed.
    async fn raw_get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ApiResponse, SyncError>;

    fn base_url(&self) -> &str;
}
