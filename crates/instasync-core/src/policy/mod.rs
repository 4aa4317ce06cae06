//! Request policies applied around every upstream call.
//!
//! ```text
//! Request → [RetryPolicy: linear backoff] → [RequestPacer: bucket + fixed delay] → Transport
//!                                                └── on 429: cooldown, one more try
//! ```

pub mod pacer;
pub mod retry;

pub use pacer::{PacingConfig, RequestPacer, TokenBucket};
pub use retry::{RetryConfig, RetryPolicy};
