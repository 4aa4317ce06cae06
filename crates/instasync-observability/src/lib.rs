//! # instasync-observability
//!
//! Structured logging for the instasync binaries. Text or JSON output on
//! stderr, with a global level and per-component overrides read from
//! `LOG_LEVEL`, `LOG_JSON` and `LOG_COMPONENTS`.

pub mod logging;

pub use logging::{init_tracing, LogConfig};
