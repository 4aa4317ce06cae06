//! Request pacing: a per-minute token bucket plus a fixed pre-request delay.
//!
//! The bucket holds `requests_per_minute` tokens and refills continuously at
//! `requests_per_minute / 60` tokens per second. Each request consumes one
//! token; when the bucket is empty the pacer sleeps until one is available.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Fixed sleep before every outbound request.
    pub request_delay: Duration,
    /// Sleep after an HTTP 429 before the single retry.
    pub rate_limit_cooldown: Duration,
    /// Request cap per rolling minute. `0` disables the cap.
    pub requests_per_minute: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(1000),
            rate_limit_cooldown: Duration::from_millis(5000),
            requests_per_minute: 60,
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket sized for `rpm` requests per minute.
    pub fn per_minute(rpm: u32) -> Self {
        Self::new(rpm as f64, rpm as f64 / 60.0)
    }

    /// Consume one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Estimated wait before one token is available.
    pub fn wait_time(&self) -> Duration {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        let deficit = 1.0 - state.tokens;
        if deficit <= 0.0 || self.refill_per_sec <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(deficit / self.refill_per_sec)
        }
    }

    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}

/// Applies the bucket and the fixed delay before each request.
pub struct RequestPacer {
    config: PacingConfig,
    bucket: Option<TokenBucket>,
}

impl RequestPacer {
    pub fn new(config: PacingConfig) -> Self {
        let bucket = (config.requests_per_minute > 0)
            .then(|| TokenBucket::per_minute(config.requests_per_minute));
        Self { config, bucket }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Wait until the next request may be sent.
    pub async fn wait_turn(&self) {
        if let Some(bucket) = &self.bucket {
            while !bucket.try_acquire() {
                let wait = bucket.wait_time().max(Duration::from_millis(10));
                tracing::debug!(wait_ms = wait.as_millis() as u64, "per-minute cap reached, waiting");
                tokio::time::sleep(wait).await;
            }
        }
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
    }

    /// Sleep for the 429 cooldown.
    pub async fn cool_down(&self) {
        if !self.config.rate_limit_cooldown.is_zero() {
            tokio::time::sleep(self.config.rate_limit_cooldown).await;
        }
    }
}
