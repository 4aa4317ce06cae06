//! instasync-http: HTTP transport for the Instantly API, backed by `reqwest`.
//!
//! [`ReqwestTransport`] is the raw wire: it attaches the bearer key and
//! standard headers and returns every HTTP status as a response. Pacing,
//! the 429 cooldown and retries live in [`instasync_core::InstantlyClient`];
//! [`connect`] wires the two together.

mod transport;

pub use transport::ReqwestTransport;

use instasync_core::{InstantlyClient, SyncConfig, SyncError};

/// Policy-wrapped client over a [`ReqwestTransport`] built from `config`.
pub fn connect(config: &SyncConfig) -> Result<InstantlyClient<ReqwestTransport>, SyncError> {
    let transport = ReqwestTransport::new(&config.api)?;
    Ok(InstantlyClient::new(transport, config))
}
