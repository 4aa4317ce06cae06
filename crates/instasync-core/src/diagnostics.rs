//! Connection test and raw-response inspection.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::InstantlyApi;
use crate::config::Endpoints;
use crate::error::SyncError;
use crate::shape::{ShapeNormalizer, ShapeSummary};

/// Result of probing one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointProbe {
    pub path: String,
    pub success: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub base_url: String,
    /// Status of the bare base-URL request. Any status counts as reachable.
    pub status: u16,
    pub message: String,
    pub campaigns_endpoint: EndpointProbe,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub shape: ShapeSummary,
    pub body: Value,
}

pub struct Diagnostics {
    api: Arc<dyn InstantlyApi>,
    campaigns_path: String,
    shape: ShapeNormalizer,
}

impl Diagnostics {
    pub fn new(api: Arc<dyn InstantlyApi>, endpoints: &Endpoints) -> Self {
        Self {
            api,
            campaigns_path: endpoints.campaigns.clone(),
            shape: ShapeNormalizer::default(),
        }
    }

    /// Hit the base URL, then one-record page of campaigns.
    ///
    /// Only a transport failure on the base request is an error; a failing
    /// campaigns probe is reported inside the result.
    pub async fn test_connection(&self) -> Result<ConnectionReport, SyncError> {
        tracing::info!(base_url = self.api.base_url(), "testing upstream connection");
        let base = self.api.raw_get("", &[]).await?;

        let query = vec![("limit".to_string(), "1".to_string())];
        let probe = match self.api.raw_get(&self.campaigns_path, &query).await {
            Ok(resp) if resp.is_success() => EndpointProbe {
                path: self.campaigns_path.clone(),
                success: true,
                status: resp.status,
                shape: Some(self.shape.describe(&resp.body)),
                error: None,
            },
            Ok(resp) => EndpointProbe {
                path: self.campaigns_path.clone(),
                success: false,
                status: resp.status,
                shape: None,
                error: resp.into_result().err().map(|e| e.to_string()),
            },
            Err(e) => EndpointProbe {
                path: self.campaigns_path.clone(),
                success: false,
                status: 0,
                shape: None,
                error: Some(e.to_string()),
            },
        };

        let message = if probe.success {
            "Connection successful"
        } else {
            tracing::warn!(error = ?probe.error, "campaigns endpoint probe failed");
            "Basic connection successful, but campaigns endpoint failed"
        };

        Ok(ConnectionReport {
            base_url: self.api.base_url().to_string(),
            status: base.status,
            message: message.to_string(),
            campaigns_endpoint: probe,
        })
    }

    /// Issue a raw `GET` and describe what came back, whatever the status.
    pub async fn debug(
        &self,
        endpoint: &str,
        params: BTreeMap<String, String>,
    ) -> Result<DebugReport, SyncError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(SyncError::MissingParameter("endpoint".into()));
        }
        let path = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{endpoint}")
        };
        let query: Vec<(String, String)> =
            params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        tracing::info!(endpoint = %path, params = ?params, "debugging upstream response");
        let resp = self.api.raw_get(&path, &query).await?;

        Ok(DebugReport {
            shape: self.shape.describe(&resp.body),
            endpoint: path,
            params,
            status: resp.status,
            headers: resp.headers.into_iter().collect(),
            body: resp.body,
        })
    }
}
