//! HTTP route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uao_common::{Agent, AgentId, Priority, TierId, UaoError};
use uao_coordinator::{HealthStatus, MetricsSnapshot, SectorRange};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub exhausted_tiers: Vec<TierId>,
    pub utilization_rate: f64,
}

/// One row of the tier table.
#[derive(Debug, Serialize)]
pub struct TierEntry {
    pub tier: TierId,
    pub sectors: SectorRange,
    pub capacity: usize,
    pub active_agents: usize,
}

/// Body of an agent request. An empty object means `normal` priority.
#[derive(Debug, Default, Deserialize)]
pub struct AgentRequest {
    #[serde(default)]
    pub priority: Priority,
}

/// An assigned agent together with its printable id.
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: String,
    pub agent: Agent,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub updated: bool,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Coordinator error carried out of a handler.
#[derive(Debug)]
pub struct ApiError(pub UaoError);

impl From<UaoError> for ApiError {
    fn from(err: UaoError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            UaoError::UnknownTier(_) => (StatusCode::NOT_FOUND, "UNKNOWN_TIER"),
            UaoError::NoAvailableAgents { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "NO_AVAILABLE_AGENTS")
            }
            UaoError::InvalidAgentId(_) => (StatusCode::BAD_REQUEST, "INVALID_AGENT_ID"),
            UaoError::AlreadyAssigned(_) => (StatusCode::CONFLICT, "ALREADY_ASSIGNED"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        let body = ErrorResponse {
            error: self.0.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

fn parse_agent_id(raw: &str) -> Result<AgentId, ApiError> {
    raw.parse::<AgentId>().map_err(ApiError::from)
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sample = state.current_health();
    Json(HealthResponse {
        status: sample.status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        exhausted_tiers: sample.exhausted_tiers,
        utilization_rate: sample.metrics.utilization_rate,
    })
}

/// Current coordination metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.coordinator.metrics())
}

/// Tier to sector range table, in sector order.
pub async fn list_tiers(State(state): State<Arc<AppState>>) -> Json<Vec<TierEntry>> {
    let coordinator = &state.coordinator;
    let entries = coordinator
        .assignments()
        .iter()
        .map(|(tier, range)| TierEntry {
            tier: tier.clone(),
            sectors: range,
            capacity: coordinator.tier_capacity(tier).unwrap_or(0),
            active_agents: coordinator.active_agents(tier),
        })
        .collect();
    Json(entries)
}

/// Assign an agent from the tier's sectors.
pub async fn request_agent(
    State(state): State<Arc<AppState>>,
    Path(tier): Path<String>,
    Json(request): Json<AgentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tier = TierId::new(tier);
    debug!(tier = %tier, priority = %request.priority, "Agent requested over HTTP");

    let agent = state.coordinator.request_agent(&tier, request.priority)?;
    Ok((
        StatusCode::CREATED,
        Json(AgentResponse {
            id: agent.id.to_string(),
            agent,
        }),
    ))
}

/// Refresh an assigned agent's activity timestamp.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let id = parse_agent_id(&id)?;
    let updated = state.coordinator.record_activity(id);
    Ok(Json(HeartbeatResponse { updated }))
}

/// Return an agent to the pool.
pub async fn release_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let id = parse_agent_id(&id)?;
    let released = state.coordinator.release_agent(id);
    if released {
        info!(agent = %id, "Agent released over HTTP");
    }
    Ok(Json(ReleaseResponse { released }))
}
