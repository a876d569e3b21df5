//! Per-tier façade used by calling services.
//!
//! A gateway holds at most one agent at a time. It never mutates agent
//! state itself; every change goes through the coordinator. Requesting
//! while already holding an agent is the caller's mistake: the gateway logs
//! it and replaces its reference on success, and the earlier agent stays
//! assigned until released by id or reclaimed by the idle sweep. A failed
//! request leaves the held agent untouched.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uao_common::{Agent, AgentId, Priority, Result, TierId, UaoError};
use uuid::Uuid;

use crate::coordinator::Coordinator;
use crate::metrics::MetricsSnapshot;
use crate::retry::RetryPolicy;

#[derive(Debug, Default)]
struct GatewayState {
    aligned: bool,
    held: Option<Agent>,
    last_coordination_ms: Option<u64>,
}

/// Health report for a single gateway.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayHealth {
    pub gateway_id: Uuid,
    pub tier: TierId,
    pub aligned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_agent: Option<AgentId>,
    pub active_agents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_coordination_ms: Option<u64>,
    pub checked_at_ms: u64,
}

pub struct TierGateway {
    id: Uuid,
    tier: TierId,
    coordinator: Arc<Coordinator>,
    retry: RetryPolicy,
    state: Mutex<GatewayState>,
}

impl TierGateway {
    pub fn new(tier: impl Into<TierId>, coordinator: Arc<Coordinator>) -> Self {
        let tier = tier.into();
        let id = Uuid::new_v4();
        let retry = coordinator.retry_policy().clone();
        debug!(gateway = %id, tier = %tier, "Gateway created");
        Self {
            id,
            tier,
            coordinator,
            retry,
            state: Mutex::new(GatewayState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tier(&self) -> &TierId {
        &self.tier
    }

    /// Replace the retry policy inherited from the coordinator config.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn is_aligned(&self) -> bool {
        self.state.lock().aligned
    }

    /// Register this gateway's tier with the coordinator.
    ///
    /// Only the first successful call has an effect.
    pub fn initialize_alignment(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.aligned {
            return Ok(());
        }

        self.coordinator.register_tier(&self.tier)?;
        state.aligned = true;
        info!(gateway = %self.id, tier = %self.tier, "Gateway aligned");
        Ok(())
    }

    /// Ask the coordinator for an agent from this tier's sectors.
    ///
    /// On success the agent becomes the held agent. On failure the held
    /// agent, if any, is kept and the error is returned as-is, including
    /// `NoAvailableAgents`. Callers must release a held agent before
    /// requesting another.
    pub fn request_agent_coordination(&self, priority: Priority) -> Result<Agent> {
        let mut state = self.state.lock();
        if !state.aligned {
            return Err(UaoError::NotAligned(self.tier.to_string()));
        }

        self.reconcile(&mut state);
        if let Some(previous) = &state.held {
            warn!(
                gateway = %self.id,
                tier = %self.tier,
                agent = %previous.id,
                "Requesting coordination while still holding an agent"
            );
        }

        let agent = self.coordinator.request_agent(&self.tier, priority)?;
        state.held = Some(agent.clone());
        state.last_coordination_ms = Some(self.coordinator.clock().now_ms());
        info!(gateway = %self.id, tier = %self.tier, agent = %agent.id, "Agent coordinated");
        Ok(agent)
    }

    /// Request an agent, retrying with this gateway's policy.
    pub async fn coordinate(&self, priority: Priority) -> Result<Agent> {
        self.request_with_retry(priority, &self.retry).await
    }

    /// Like [`request_agent_coordination`](Self::request_agent_coordination),
    /// retrying `NoAvailableAgents` with backoff.
    ///
    /// Gives up with `NoAvailableAgents` once `policy.max_retries` is spent or
    /// the next wait would cross `policy.timeout()`. Other errors are returned
    /// immediately.
    pub async fn request_with_retry(
        &self,
        priority: Priority,
        policy: &RetryPolicy,
    ) -> Result<Agent> {
        let deadline = Instant::now() + policy.timeout();
        let mut attempt = 0;

        loop {
            match self.request_agent_coordination(priority) {
                Err(e) if e.is_recoverable() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    if Instant::now() + delay >= deadline {
                        warn!(
                            gateway = %self.id,
                            tier = %self.tier,
                            attempts = attempt + 1,
                            "Coordination deadline reached"
                        );
                        return Err(e);
                    }

                    warn!(
                        gateway = %self.id,
                        tier = %self.tier,
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying coordination"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Release the held agent. `false` if nothing was held or the lease had
    /// already been reclaimed.
    pub fn release_agent(&self) -> bool {
        let Some(held) = self.state.lock().held.take() else {
            return false;
        };

        let released = self.coordinator.release_lease(&held);
        if released {
            info!(gateway = %self.id, tier = %self.tier, agent = %held.id, "Agent released");
        } else {
            debug!(gateway = %self.id, agent = %held.id, "Held lease was already reclaimed");
        }
        released
    }

    /// Mark the held agent as active so the idle sweep leaves it alone.
    pub fn heartbeat(&self) -> bool {
        let mut state = self.state.lock();
        self.reconcile(&mut state);
        match &state.held {
            Some(held) => self.coordinator.record_activity(held.id),
            None => false,
        }
    }

    /// The held agent, if its lease is still valid.
    pub fn held_agent(&self) -> Option<Agent> {
        let mut state = self.state.lock();
        self.reconcile(&mut state);
        state.held.clone()
    }

    /// Agents the coordinator counts as held by this tier (all gateways).
    pub fn active_agent_count(&self) -> usize {
        self.coordinator.active_agents(&self.tier)
    }

    pub fn coordination_metrics(&self) -> MetricsSnapshot {
        self.coordinator.metrics()
    }

    pub fn health_check(&self) -> GatewayHealth {
        let mut state = self.state.lock();
        self.reconcile(&mut state);

        GatewayHealth {
            gateway_id: self.id,
            tier: self.tier.clone(),
            aligned: state.aligned,
            held_agent: state.held.as_ref().map(|a| a.id),
            active_agents: self.coordinator.active_agents(&self.tier),
            last_coordination_ms: state.last_coordination_ms,
            checked_at_ms: self.coordinator.clock().now_ms(),
        }
    }

    /// Release anything held and drop alignment.
    pub fn shutdown(&self) {
        self.release_agent();
        self.state.lock().aligned = false;
        info!(gateway = %self.id, tier = %self.tier, "Gateway shut down");
    }

    /// Forget a held agent whose lease the coordinator no longer honours,
    /// e.g. after an idle sweep.
    fn reconcile(&self, state: &mut GatewayState) {
        let Some(held) = &state.held else {
            return;
        };
        let still_held = self
            .coordinator
            .agent(held.id)
            .is_some_and(|current| current.same_lease(held));
        if !still_held {
            debug!(gateway = %self.id, agent = %held.id, "Held agent was reclaimed");
            state.held = None;
        }
    }
}

impl Drop for TierGateway {
    fn drop(&mut self) {
        if let Some(held) = self.state.get_mut().held.take() {
            self.coordinator.release_lease(&held);
        }
    }
}
