use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;

use instasync_core::api::{ApiRequest, ApiResponse, HttpMethod, HttpTransport};
use instasync_core::config::ApiConfig;
use instasync_core::SyncError;

/// `HttpTransport` over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    base_url: String,
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| SyncError::Config(format!("API key is not a valid header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| SyncError::Config(format!("invalid user agent: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, req: &ApiRequest) -> Result<ApiResponse, SyncError> {
        let url = self.url(&req.path);
        let builder = match req.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
        };
        let builder = if req.query.is_empty() {
            builder
        } else {
            builder.query(&req.query)
        };
        let builder = match &req.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let resp = builder.send().await.map_err(|e| {
            tracing::warn!(method = %req.method, %url, timeout = e.is_timeout(), error = %e, "request failed");
            SyncError::Transport(e.to_string())
        })?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let text = resp
            .text()
            .await
            .map_err(|e| SyncError::Transport(format!("reading body: {e}")))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        tracing::debug!(method = %req.method, %url, status, "response received");
        Ok(ApiResponse {
            status,
            body,
            headers,
        })
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
