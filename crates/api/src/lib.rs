//! HTTP control surface for the UAO coordinator.
//!
//! # Endpoints
//!
//! - `GET /health` - Status from the latest health sample
//! - `GET /api/v1/metrics` - Coordination metrics snapshot
//! - `GET /api/v1/tiers` - Tier to sector range table
//! - `POST /api/v1/tiers/{tier}/agents` - Assign an agent from a tier
//! - `POST /api/v1/agents/{id}/heartbeat` - Record agent activity
//! - `DELETE /api/v1/agents/{id}` - Release an agent
//!
//! Agent requests go straight to the coordinator. HTTP callers track their
//! agent by id, so no `TierGateway` or tier registration is involved.
//!
//! ```text
//! HTTP client
//!    │
//!    ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │   uao-api       │ ───► │   Coordinator   │
//! │    (Axum)       │      │  (agent pool)   │
//! └─────────────────┘      └────────┬────────┘
//!                                   │
//!                          ┌────────┴────────┐
//!                          │ HealthReporter  │
//!                          └─────────────────┘
//! ```

pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/metrics", get(routes::metrics))
        .route("/api/v1/tiers", get(routes::list_tiers))
        .route("/api/v1/tiers/{tier}/agents", post(routes::request_agent))
        .route("/api/v1/agents/{id}/heartbeat", post(routes::heartbeat))
        .route("/api/v1/agents/{id}", delete(routes::release_agent))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F>(state: Arc<AppState>, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "UAO API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("UAO API stopped");
    Ok(())
}
