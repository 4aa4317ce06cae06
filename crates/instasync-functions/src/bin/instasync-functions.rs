//! instasync-functions server.
//!
//! Environment: `INSTANTLY_API_KEY` (required), `INSTASYNC_DB` (SQLite path,
//! `sqlite` feature), `PORT` (default 8080), `LOG_LEVEL`, `LOG_JSON`, plus
//! the sync settings read by `SyncConfig::from_env`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use instasync_core::{InstantlyApi, SyncConfig};
use instasync_functions::scheduler::DailyScheduler;
use instasync_functions::{router, AppState};
use instasync_observability::{init_tracing, LogConfig};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&LogConfig::default().merge_env()).context("initialising logging")?;

    let config = SyncConfig::from_env().context("loading sync configuration")?;
    let api: Arc<dyn InstantlyApi> =
        Arc::new(instasync_http::connect(&config).context("building Instantly client")?);
    let store = instasync_storage::open_store(std::env::var("INSTASYNC_DB").ok().as_deref())
        .await
        .context("opening document store")?;

    let schedule = config.schedule.clone();
    let state = AppState::new(api, store, config);

    if schedule.enabled {
        let scheduler = DailyScheduler::new(state.runner.clone(), &schedule)
            .context("parsing sync schedule")?;
        scheduler.spawn();
    } else {
        tracing::info!("scheduled sync disabled");
    }

    let port = match std::env::var("PORT") {
        Ok(p) => p.parse().with_context(|| format!("invalid PORT '{p}'"))?,
        Err(_) => DEFAULT_PORT,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "instasync-functions listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
