//! The coordinator: sole owner and mutator of agent state.
//!
//! Every select-and-assign, release and idle sweep runs inside one
//! `parking_lot::Mutex` over the pool, the counters and the RNG, so a scan
//! can never race a mutation and metrics never drift from the pool.
//! Events are published on a broadcast channel after the lock is dropped.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use uao_common::{
    Agent, AgentId, CoordinationEvent, Priority, ReleaseReason, Result, TierId, UaoError,
};

use crate::clock::{Clock, SystemClock};
use crate::config::CoordinatorConfig;
use crate::metrics::{CoordinationMetrics, MetricsSnapshot};
use crate::pool::AgentPool;
use crate::retry::RetryPolicy;
use crate::sectors::{compute_assignments, SectorAssignments};
use crate::selection::select_agent;

struct CoordinatorState {
    pool: AgentPool,
    metrics: CoordinationMetrics,
    rng: StdRng,
    registered: HashSet<TierId>,
}

pub struct Coordinator {
    state: Mutex<CoordinatorState>,
    assignments: SectorAssignments,
    events: broadcast::Sender<CoordinationEvent>,
    clock: Arc<dyn Clock>,
    agents_per_sector: u32,
    retry: RetryPolicy,
}

impl Coordinator {
    /// Build a coordinator on the system clock.
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a coordinator on an explicit clock.
    pub fn with_clock(config: &CoordinatorConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let assignments = compute_assignments(&config.tiers, config.pool.sector_count)?;
        let pool = AgentPool::initialize(
            config.pool.sector_count,
            config.pool.agents_per_sector,
            clock.now_ms(),
        )?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (events, _) = broadcast::channel(config.event_capacity);

        for (tier, range) in assignments.iter() {
            debug!(tier = %tier, start = range.start, end = range.end, "Sector range assigned");
        }
        info!(
            sectors = pool.sector_count(),
            agents_per_sector = pool.per_sector(),
            total_agents = pool.len(),
            tiers = assignments.len(),
            "Coordinator initialized"
        );

        Ok(Self {
            state: Mutex::new(CoordinatorState {
                pool,
                metrics: CoordinationMetrics::new(),
                rng,
                registered: HashSet::new(),
            }),
            assignments,
            events,
            clock,
            agents_per_sector: config.pool.agents_per_sector,
            retry: config.retry.clone(),
        })
    }

    /// Configured retry policy; gateways start from it.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn assignments(&self) -> &SectorAssignments {
        &self.assignments
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn total_agents(&self) -> usize {
        self.state.lock().pool.len()
    }

    /// Number of agents in `tier`'s sectors.
    pub fn tier_capacity(&self, tier: &TierId) -> Option<usize> {
        self.assignments
            .range(tier)
            .map(|range| range.len() as usize * self.agents_per_sector as usize)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.events.subscribe()
    }

    /// Record that `tier` has a gateway attached. Idempotent.
    pub fn register_tier(&self, tier: &TierId) -> Result<()> {
        if !self.assignments.contains_tier(tier) {
            return Err(UaoError::UnknownTier(tier.to_string()));
        }
        if self.state.lock().registered.insert(tier.clone()) {
            info!(tier = %tier, "Tier registered with coordinator");
        }
        Ok(())
    }

    pub fn is_registered(&self, tier: &TierId) -> bool {
        self.state.lock().registered.contains(tier)
    }

    /// Assign an available agent from `tier`'s sectors.
    ///
    /// Fails with `UnknownTier` (no metrics recorded) or `NoAvailableAgents`
    /// (recorded as a failed request). Never retries.
    pub fn request_agent(&self, tier: &TierId, priority: Priority) -> Result<Agent> {
        let started = Instant::now();
        let range = self
            .assignments
            .range(tier)
            .ok_or_else(|| UaoError::UnknownTier(tier.to_string()))?;

        let assigned = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let now = self.clock.now_ms();

            let candidates: Vec<&Agent> = state.pool.available_in_range(range).collect();
            match select_agent(&candidates, priority, &mut state.rng) {
                Some(id) => {
                    state.pool.mark_assigned(id, tier, now)?;
                    let elapsed = started.elapsed();
                    state.metrics.record_success(tier, elapsed);
                    state.pool.get(id).cloned().map(|agent| (agent, elapsed))
                }
                None => {
                    state.metrics.record_failure();
                    None
                }
            }
        };

        match assigned {
            Some((agent, elapsed)) => {
                debug!(
                    tier = %tier,
                    agent = %agent.id,
                    priority = %priority,
                    elapsed_us = elapsed.as_micros() as u64,
                    "Agent assigned"
                );
                self.emit(CoordinationEvent::AgentAssigned {
                    agent: agent.clone(),
                    tier: tier.clone(),
                    priority,
                    elapsed_us: elapsed.as_micros() as u64,
                });
                Ok(agent)
            }
            None => {
                warn!(tier = %tier, priority = %priority, "No available agents in tier sectors");
                self.emit(CoordinationEvent::CoordinationFailed {
                    tier: tier.clone(),
                    priority,
                    reason: "no available agents".into(),
                });
                Err(UaoError::NoAvailableAgents { tier: tier.clone() })
            }
        }
    }

    /// Return an agent to the pool.
    ///
    /// `false` when the id is unknown or the agent is already available;
    /// nothing changes in that case.
    pub fn release_agent(&self, id: AgentId) -> bool {
        let released = {
            let mut state = self.state.lock();
            Self::release_locked(&mut state, id, self.clock.now_ms(), false)
        };
        self.finish_release(released, ReleaseReason::Explicit)
    }

    /// Release `held` only if it is still the same lease: same tier, same
    /// assignment generation. A holder whose agent was reclaimed and handed
    /// to someone else gets `false` and leaves the new holder alone.
    pub fn release_lease(&self, held: &Agent) -> bool {
        let released = {
            let mut state = self.state.lock();
            let still_held = state
                .pool
                .get(held.id)
                .is_some_and(|current| current.same_lease(held));
            if still_held {
                Self::release_locked(&mut state, held.id, self.clock.now_ms(), false)
            } else {
                None
            }
        };
        self.finish_release(released, ReleaseReason::Explicit)
    }

    /// Refresh the activity timestamp of an assigned agent.
    pub fn record_activity(&self, id: AgentId) -> bool {
        let now = self.clock.now_ms();
        self.state.lock().pool.touch(id, now)
    }

    /// Release every assigned agent idle for at least `threshold`.
    pub fn release_idle_agents(&self, threshold: Duration) -> Vec<AgentId> {
        let threshold_ms = threshold.as_millis() as u64;

        let released: Vec<(Agent, TierId)> = {
            let mut state = self.state.lock();
            let now = self.clock.now_ms();
            let idle: Vec<AgentId> = state
                .pool
                .assigned()
                .filter(|agent| now.saturating_sub(agent.last_activity_ms) >= threshold_ms)
                .map(|agent| agent.id)
                .collect();

            idle.into_iter()
                .filter_map(|id| Self::release_locked(&mut state, id, now, true))
                .collect()
        };

        if !released.is_empty() {
            info!(count = released.len(), threshold_ms, "Reclaimed idle agents");
        }

        released
            .into_iter()
            .map(|(agent, tier)| {
                let id = agent.id;
                self.finish_release(Some((agent, tier)), ReleaseReason::IdleSweep);
                id
            })
            .collect()
    }

    /// Snapshot of an agent record.
    pub fn agent(&self, id: AgentId) -> Option<Agent> {
        self.state.lock().pool.get(id).cloned()
    }

    /// Agents currently held by `tier`.
    pub fn active_agents(&self, tier: &TierId) -> usize {
        self.state.lock().metrics.active(tier)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        let (_, assigned) = state.pool.counts();
        state.metrics.snapshot(state.pool.len(), assigned)
    }

    /// Must be called with the state lock held. Returns the released agent
    /// and the tier that held it.
    fn release_locked(
        state: &mut CoordinatorState,
        id: AgentId,
        now_ms: u64,
        idle: bool,
    ) -> Option<(Agent, TierId)> {
        let previous_tier = state.pool.mark_available(id, now_ms)?;
        state.metrics.record_release(&previous_tier, idle);
        let agent = state.pool.get(id).cloned()?;
        Some((agent, previous_tier))
    }

    fn finish_release(&self, released: Option<(Agent, TierId)>, reason: ReleaseReason) -> bool {
        let Some((agent, previous_tier)) = released else {
            return false;
        };

        debug!(agent = %agent.id, tier = %previous_tier, reason = ?reason, "Agent released");
        self.emit(CoordinationEvent::AgentReleased {
            agent,
            previous_tier,
            reason,
        });
        true
    }

    fn emit(&self, event: CoordinationEvent) {
        if self.events.send(event).is_err() {
            trace!("No coordination event subscribers");
        }
    }
}
