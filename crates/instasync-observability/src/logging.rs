//! Subscriber setup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use instasync_core::SyncError;

/// Level, per-component overrides and output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for everything without an override.
    pub level: String,
    /// Crate or module → level. Dashes are accepted in crate names.
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    /// One JSON object per line instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::with_level("info")
    }
}

impl LogConfig {
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            components: BTreeMap::new(),
            json: false,
        }
    }

    /// `LOG_LEVEL`, `LOG_JSON` (`1`/`true`/`yes`) and `LOG_COMPONENTS`
    /// (`instasync-core=debug,tower_http=warn`), on top of `self`.
    pub fn merge_env(self) -> Self {
        self.merge_lookup(|key| std::env::var(key).ok())
    }

    pub fn merge_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = lookup("LOG_LEVEL").filter(|l| !l.trim().is_empty()) {
            self.level = level.trim().to_string();
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.json = matches!(json.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(raw) = lookup("LOG_COMPONENTS") {
            for (component, level) in raw.split(',').filter_map(|pair| pair.split_once('=')) {
                self.components
                    .insert(component.trim().to_string(), level.trim().to_string());
            }
        }
        self
    }

    /// `EnvFilter` directives, e.g. `"info,instasync_core=debug"`.
    pub fn directives(&self) -> String {
        self.components
            .iter()
            .fold(self.level.clone(), |mut acc, (component, level)| {
                acc.push_str(&format!(",{}={}", component.replace('-', "_"), level));
                acc
            })
    }

    fn filter(&self) -> Result<EnvFilter, SyncError> {
        let directives = self.directives();
        EnvFilter::try_new(&directives)
            .map_err(|e| SyncError::Config(format!("invalid log directives '{directives}': {e}")))
    }
}

/// Install the global subscriber, writing to stderr so command output on
/// stdout stays clean. Fails on bad directives or a second install.
pub fn init_tracing(config: &LogConfig) -> Result<(), SyncError> {
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| SyncError::Config(format!("tracing already initialised: {e}")))
}
