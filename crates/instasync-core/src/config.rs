//! Immutable sync configuration.
//!
//! A [`SyncConfig`] is built once (in code, through [`SyncConfigBuilder`], or
//! from environment variables) and handed to each component when it is
//! constructed. Nothing reads configuration from globals after startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::policy::{PacingConfig, RetryConfig};

/// Hard upper bound on documents per atomic commit.
pub const MAX_BATCH_SIZE: usize = 500;

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.instantly.ai/api/v2";

/// Endpoint templates relative to the base URL. `{id}` is substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub campaigns: String,
    pub campaign_details: String,
    pub campaign_metrics: String,
    pub campaign_subscribers: String,
    pub leads_list: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            campaigns: "/campaigns".into(),
            campaign_details: "/campaigns/{id}".into(),
            campaign_metrics: "/campaigns/{id}/metrics".into(),
            campaign_subscribers: "/campaigns/{id}/subscribers".into(),
            leads_list: "/leads/list".into(),
        }
    }
}

impl Endpoints {
    /// Substitute `{id}` in a template.
    pub fn render(template: &str, id: &str) -> String {
        template.replace("{id}", id)
    }
}

/// Upstream API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub endpoints: Endpoints,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: String::new(),
            user_agent: format!("instasync/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
            endpoints: Endpoints::default(),
        }
    }
}

/// Storage collection names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collections {
    pub campaigns: String,
    pub leads: String,
    /// Holds bookkeeping documents such as `last_sync`.
    pub system: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            campaigns: "campaigns".into(),
            leads: "leads".into(),
            system: "system".into(),
        }
    }
}

/// Daily scheduled-sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Five-field cron expression (`min hour dom month dow`).
    pub cron: String,
    /// Offset from UTC, in minutes, the cron expression is evaluated in.
    pub utc_offset_minutes: i32,
    pub enabled: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: "0 2 * * *".into(),
            // America/Mexico_City, which no longer observes DST.
            utc_offset_minutes: -360,
            enabled: true,
        }
    }
}

/// Complete configuration for one instasync deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub api: ApiConfig,
    pub pacing: PacingConfig,
    pub retry: RetryConfig,
    /// Records requested per page.
    pub page_size: u32,
    /// Documents per atomic commit (1..=500).
    pub batch_size: usize,
    pub collections: Collections,
    pub schedule: ScheduleConfig,
    /// Bearer token required by the callable sync entry point.
    #[serde(skip_serializing)]
    pub callable_token: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            pacing: PacingConfig::default(),
            retry: RetryConfig::default(),
            page_size: 100,
            batch_size: MAX_BATCH_SIZE,
            collections: Collections::default(),
            schedule: ScheduleConfig::default(),
            callable_token: None,
        }
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, secrets map, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("INSTANTLY_API_KEY") {
            config.api.api_key = key;
        }
        if let Some(url) = lookup("INSTANTLY_API_BASE_URL") {
            config.api.base_url = url;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "RATE_LIMIT_DELAY_MS")? {
            config.pacing.request_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "RATE_LIMIT_COOLDOWN_MS")? {
            config.pacing.rate_limit_cooldown = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<u32>(&lookup, "MAX_RETRY_ATTEMPTS")? {
            config.retry.max_attempts = n;
        }
        if let Some(n) = parse_var::<usize>(&lookup, "SYNC_BATCH_SIZE")? {
            config.batch_size = n;
        }
        if let Some(n) = parse_var::<u32>(&lookup, "SYNC_PAGE_SIZE")? {
            config.page_size = n;
        }
        if let Some(cron) = lookup("DAILY_SYNC_SCHEDULE") {
            config.schedule.cron = cron;
        }
        if let Some(offset) = parse_var::<i32>(&lookup, "SYNC_UTC_OFFSET_MINUTES")? {
            config.schedule.utc_offset_minutes = offset;
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "DAILY_SYNC_ENABLED")? {
            config.schedule.enabled = enabled;
        }
        config.callable_token = lookup("CALLABLE_TOKEN").filter(|t| !t.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.api.api_key.trim().is_empty() {
            return Err(SyncError::Config("INSTANTLY_API_KEY is required".into()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(SyncError::Config("INSTANTLY_API_BASE_URL is required".into()));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(SyncError::Config(format!(
                "batch size must be within 1..={MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.page_size == 0 {
            return Err(SyncError::Config("page size must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Config("MAX_RETRY_ATTEMPTS must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, SyncError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SyncError::Config(format!("{key} has an invalid value: {raw}"))),
    }
}

/// Fluent builder for [`SyncConfig`].
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api.api_key = key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    /// Fixed delay applied before every outbound request.
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.config.pacing.request_delay = delay;
        self
    }

    /// Wait after an HTTP 429 before the single interceptor retry.
    pub fn rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.pacing.rate_limit_cooldown = cooldown;
        self
    }

    pub fn requests_per_minute(mut self, n: u32) -> Self {
        self.config.pacing.requests_per_minute = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn page_size(mut self, n: u32) -> Self {
        self.config.page_size = n;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn schedule(mut self, cron: impl Into<String>, utc_offset_minutes: i32) -> Self {
        self.config.schedule.cron = cron.into();
        self.config.schedule.utc_offset_minutes = utc_offset_minutes;
        self
    }

    pub fn callable_token(mut self, token: impl Into<String>) -> Self {
        self.config.callable_token = Some(token.into());
        self
    }

    /// Zero every delay. Used by tests and local dry runs.
    pub fn without_delays(mut self) -> Self {
        self.config.pacing.request_delay = Duration::ZERO;
        self.config.pacing.rate_limit_cooldown = Duration::ZERO;
        self.config.retry.base_delay = Duration::ZERO;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<SyncConfig, SyncError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without validation.
    pub fn build_unchecked(self) -> SyncConfig {
        self.config
    }
}
