//! instasync-functions: HTTP entry points and the scheduled sync.
//!
//! | route | method | |
//! |---|---|---|
//! | `/sync` | POST | full sync |
//! | `/sync/campaign` | POST | one campaign (`campaignId` in query or body) |
//! | `/campaigns` | GET | stored campaigns (`status`, `limit`, `page`) |
//! | `/campaigns/:id` | GET | one stored campaign |
//! | `/campaigns/:id/metrics` | GET | live metrics from the upstream |
//! | `/campaigns/:id/subscribers` | GET | live subscriber list from the upstream |
//! | `/test-connection` | GET | upstream reachability |
//! | `/debug` | GET | raw upstream response for `endpoint` |
//! | `/sync-stats` | GET | counts, lead breakdown, last run |
//! | `/callable/sync` | POST | full sync behind `Authorization: Bearer` |
//!
//! The daily sync runs from [`scheduler::DailyScheduler`].

pub mod auth;
pub mod envelope;
pub mod handlers;
pub mod scheduler;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use instasync_core::store::DocumentStore;
use instasync_core::{Diagnostics, InstantlyApi, SyncConfig, SyncRunner};

pub use envelope::{ApiError, Envelope};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<SyncRunner>,
    pub diagnostics: Arc<Diagnostics>,
    pub callable_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        api: Arc<dyn InstantlyApi>,
        store: Arc<dyn DocumentStore>,
        config: SyncConfig,
    ) -> Self {
        let diagnostics = Diagnostics::new(api.clone(), &config.api.endpoints);
        let callable_token = config.callable_token.as_deref().map(Arc::from);
        Self {
            runner: Arc::new(SyncRunner::new(api, store, config)),
            diagnostics: Arc::new(diagnostics),
            callable_token,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sync", post(handlers::sync_all))
        .route("/sync/campaign", post(handlers::sync_campaign))
        .route("/campaigns", get(handlers::list_campaigns))
        .route("/campaigns/:id", get(handlers::get_campaign))
        .route("/campaigns/:id/metrics", get(handlers::campaign_metrics))
        .route("/campaigns/:id/subscribers", get(handlers::campaign_subscribers))
        .route("/test-connection", get(handlers::test_connection))
        .route("/debug", get(handlers::debug))
        .route("/sync-stats", get(handlers::sync_stats))
        .route("/callable/sync", post(handlers::callable_sync))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
