//! `InstantlyClient`: the policy-wrapped upstream client.
//!
//! Every call goes through two independent mechanisms that can compound:
//! - the pacer path: bucket + fixed delay, and on HTTP 429 a cooldown
//!   followed by exactly one resend of the same request;
//! - the [`RetryPolicy`] around the whole thing, retrying any failure with
//!   linear backoff.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiRequest, ApiResponse, HttpTransport, InstantlyApi};
use crate::config::{Endpoints, SyncConfig};
use crate::error::SyncError;
use crate::policy::{RequestPacer, RetryPolicy};

/// Upstream client generic over the wire transport.
pub struct InstantlyClient<T> {
    transport: T,
    endpoints: Endpoints,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl<T: HttpTransport> InstantlyClient<T> {
    pub fn new(transport: T, config: &SyncConfig) -> Self {
        Self {
            transport,
            endpoints: config.api.endpoints.clone(),
            pacer: RequestPacer::new(config.pacing.clone()),
            retry: RetryPolicy::new(config.retry.clone()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Paced send with the single cooldown resend on 429. Returns the raw
    /// response whatever its status.
    pub async fn send(&self, req: &ApiRequest) -> Result<ApiResponse, SyncError> {
        self.pacer.wait_turn().await;
        let resp = self.transport.execute(req).await?;
        if !resp.is_rate_limited() {
            return Ok(resp);
        }

        tracing::warn!(
            method = %req.method,
            path = %req.path,
            cooldown_ms = self.pacer.config().rate_limit_cooldown.as_millis() as u64,
            "rate limit exceeded, waiting before retry"
        );
        self.pacer.cool_down().await;
        self.pacer.wait_turn().await;
        self.transport.execute(req).await
    }

    /// Send under the retry policy and require a success status.
    pub async fn call(&self, req: ApiRequest) -> Result<Value, SyncError> {
        let label = format!("{} {}", req.method, req.path);
        let req = &req;
        self.retry
            .run(&label, move || async move {
                let resp = self.send(req).await?;
                if resp.is_rate_limited() {
                    return Err(SyncError::RateLimited {
                        endpoint: req.path.clone(),
                    });
                }
                resp.into_result()
            })
            .await
    }

    fn paged(path: String, limit: u32, starting_after: Option<&str>) -> ApiRequest {
        let req = ApiRequest::get(path).query("limit", limit);
        match starting_after {
            Some(cursor) => req.query("starting_after", cursor),
            None => req,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> InstantlyApi for InstantlyClient<T> {
    async fn list_campaigns(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError> {
        tracing::debug!(limit, starting_after = ?starting_after, "fetching campaigns page");
        let req = Self::paged(self.endpoints.campaigns.clone(), limit, starting_after);
        self.call(req).await
    }

    async fn list_leads(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError> {
        tracing::debug!(limit, starting_after = ?starting_after, "fetching leads page");
        let mut body = json!({ "limit": limit });
        if let Some(cursor) = starting_after {
            body["starting_after"] = Value::String(cursor.to_string());
        }
        self.call(ApiRequest::post(self.endpoints.leads_list.clone(), body))
            .await
    }

    async fn campaign(&self, id: &str) -> Result<Value, SyncError> {
        let path = Endpoints::render(&self.endpoints.campaign_details, id);
        match self.call(ApiRequest::get(path)).await {
            Err(SyncError::Http { status: 404, .. }) => {
                Err(SyncError::NotFound(format!("campaign {id}")))
            }
            other => other,
        }
    }

    async fn campaign_metrics(&self, id: &str) -> Result<Value, SyncError> {
        let path = Endpoints::render(&self.endpoints.campaign_metrics, id);
        match self.call(ApiRequest::get(path)).await {
            Err(SyncError::Http { status: 404, .. }) => {
                Err(SyncError::NotFound(format!("metrics for campaign {id}")))
            }
            other => other,
        }
    }

    async fn campaign_subscribers(
        &self,
        id: &str,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<Value, SyncError> {
        let path = Endpoints::render(&self.endpoints.campaign_subscribers, id);
        self.call(Self::paged(path, limit, starting_after)).await
    }

    async fn raw_get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ApiResponse, SyncError> {
        let mut req = ApiRequest::get(path);
        req.query = query.to_vec();
        self.send(&req).await
    }

    fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<ApiResponse, SyncError>>>,
        seen: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<ApiResponse, SyncError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(vec![]),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, req: &ApiRequest) -> Result<ApiResponse, SyncError> {
            self.seen.lock().unwrap().push(req.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::new(200, json!([]))))
        }

        fn base_url(&self) -> &str {
            "http://mock"
        }
    }

    fn config(max_attempts: u32) -> SyncConfig {
        SyncConfig::builder()
            .api_key("test")
            .without_delays()
            .requests_per_minute(0)
            .max_attempts(max_attempts)
            .build()
            .unwrap()
    }

    fn ok(body: Value) -> Result<ApiResponse, SyncError> {
        Ok(ApiResponse::new(200, body))
    }

    fn status(code: u16) -> Result<ApiResponse, SyncError> {
        Ok(ApiResponse::new(code, json!({ "error": "x" })))
    }

    #[tokio::test]
    async fn rate_limit_once_then_success_resends_exactly_once() {
        let transport = ScriptedTransport::new(vec![status(429), ok(json!({"items": [1]}))]);
        let client = InstantlyClient::new(transport, &config(3));

        let body = client.list_campaigns(10, None).await.unwrap();

        assert_eq!(body, json!({"items": [1]}));
        assert_eq!(client.transport().calls(), 2);
    }

    #[tokio::test]
    async fn interceptor_and_retry_compound() {
        // 429 → 429 (interceptor exhausted) → retry helper → 200
        let transport = ScriptedTransport::new(vec![status(429), status(429), ok(json!([]))]);
        let client = InstantlyClient::new(transport, &config(3));

        client.list_campaigns(10, None).await.unwrap();
        assert_eq!(client.transport().calls(), 3);
    }

    #[tokio::test]
    async fn persistent_rate_limit_surfaces_rate_limited() {
        let transport = ScriptedTransport::new(vec![status(429), status(429)]);
        let client = InstantlyClient::new(transport, &config(1));

        let err = client.list_campaigns(10, None).await.unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_max_attempts() {
        let transport = ScriptedTransport::new(vec![status(500), status(502), status(503)]);
        let client = InstantlyClient::new(transport, &config(3));

        let err = client.campaign("c1").await.unwrap_err();
        assert_eq!(client.transport().calls(), 3);
        assert!(matches!(err, SyncError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn campaign_404_maps_to_not_found() {
        let transport = ScriptedTransport::new(vec![status(404)]);
        let client = InstantlyClient::new(transport, &config(1));

        let err = client.campaign("missing").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn leads_use_post_body_cursor() {
        let transport = ScriptedTransport::new(vec![ok(json!({"items": []}))]);
        let client = InstantlyClient::new(transport, &config(1));

        client.list_leads(50, Some("cur-1")).await.unwrap();

        let seen = client.transport().seen.lock().unwrap();
        assert_eq!(seen[0].path, "/leads/list");
        assert_eq!(
            seen[0].body,
            Some(json!({"limit": 50, "starting_after": "cur-1"}))
        );
    }

    #[tokio::test]
    async fn campaigns_use_query_cursor() {
        let transport = ScriptedTransport::new(vec![ok(json!([]))]);
        let client = InstantlyClient::new(transport, &config(1));

        client.list_campaigns(100, Some("abc")).await.unwrap();

        let seen = client.transport().seen.lock().unwrap();
        assert_eq!(seen[0].path, "/campaigns");
        assert!(seen[0]
            .query
            .contains(&("starting_after".to_string(), "abc".to_string())));
    }

    #[tokio::test]
    async fn raw_get_returns_error_statuses_unchanged() {
        let transport = ScriptedTransport::new(vec![status(401)]);
        let client = InstantlyClient::new(transport, &config(3));

        let resp = client.raw_get("/", &[]).await.unwrap();
        assert_eq!(resp.status, 401);
        assert_eq!(client.transport().calls(), 1);
    }
}
