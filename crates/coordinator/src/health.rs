//! Periodic health sampling and idle-agent reclamation.
//!
//! The reporter only reads coordinator metrics and asks the coordinator to
//! release idle agents; it never touches the pool directly. Reclamation is
//! pull-based, so an idle agent is noticed at most one interval late.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::watch;
//! use uao_coordinator::{Coordinator, CoordinatorConfig, HealthReporter};
//!
//! # async fn run() -> uao_coordinator::Result<()> {
//! let config = CoordinatorConfig::default();
//! let coordinator = Arc::new(Coordinator::new(&config)?);
//! let reporter = Arc::new(HealthReporter::new(coordinator, config.health.clone()));
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = reporter.clone().spawn(shutdown_rx);
//!
//! // ... serve traffic ...
//!
//! let _ = shutdown_tx.send(true);
//! let _ = handle.await;
//! # Ok(())
//! # }
//! ```

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uao_common::{AgentId, TierId};

use crate::config::HealthConfig;
use crate::coordinator::Coordinator;
use crate::metrics::MetricsSnapshot;

/// Health status levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        }
    }
}

/// One observation of the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSample {
    pub status: HealthStatus,
    pub metrics: MetricsSnapshot,
    /// Tiers with no available agent left
    pub exhausted_tiers: Vec<TierId>,
    /// Agents reclaimed by the sweep that preceded this sample
    pub reclaimed: usize,
    pub sampled_at_ms: u64,
}

pub struct HealthReporter {
    coordinator: Arc<Coordinator>,
    config: HealthConfig,
    history: RwLock<VecDeque<HealthSample>>,
}

impl HealthReporter {
    pub fn new(coordinator: Arc<Coordinator>, config: HealthConfig) -> Self {
        Self {
            coordinator,
            config,
            history: RwLock::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Read and log the coordinator metrics. No side effects on the
    /// coordinator.
    pub fn sample(&self) -> HealthSample {
        self.record(0)
    }

    /// Release every assigned agent idle for at least `threshold_ms`.
    pub fn sweep_idle_agents(&self, threshold_ms: u64) -> Vec<AgentId> {
        self.coordinator
            .release_idle_agents(Duration::from_millis(threshold_ms))
    }

    /// One reporter cycle: sweep with the configured threshold, then sample.
    pub fn tick(&self) -> HealthSample {
        let reclaimed = self.sweep_idle_agents(self.config.idle_threshold_ms);
        self.record(reclaimed.len())
    }

    pub fn latest(&self) -> Option<HealthSample> {
        self.history.read().back().cloned()
    }

    /// Samples oldest first.
    pub fn history(&self) -> Vec<HealthSample> {
        self.history.read().iter().cloned().collect()
    }

    /// Run `tick` every `sample_interval_ms` until `shutdown` flips to true
    /// or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = Duration::from_millis(self.config.sample_interval_ms);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = period.as_millis() as u64, "Health reporter started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Health reporter stopped");
        })
    }

    fn classify(&self, metrics: &MetricsSnapshot, exhausted: &[TierId]) -> HealthStatus {
        if metrics.utilization_rate >= self.config.critical_utilization {
            HealthStatus::Critical
        } else if metrics.utilization_rate >= self.config.degraded_utilization
            || !exhausted.is_empty()
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    fn exhausted_tiers(&self, metrics: &MetricsSnapshot) -> Vec<TierId> {
        self.coordinator
            .assignments()
            .tiers()
            .filter(|tier| {
                let active = metrics
                    .active_by_tier
                    .get(tier.as_str())
                    .copied()
                    .unwrap_or(0);
                self.coordinator
                    .tier_capacity(tier)
                    .is_some_and(|capacity| active >= capacity)
            })
            .cloned()
            .collect()
    }

    fn record(&self, reclaimed: usize) -> HealthSample {
        let metrics = self.coordinator.metrics();
        let exhausted_tiers = self.exhausted_tiers(&metrics);
        let status = self.classify(&metrics, &exhausted_tiers);

        let sample = HealthSample {
            status,
            metrics,
            exhausted_tiers,
            reclaimed,
            sampled_at_ms: self.coordinator.clock().now_ms(),
        };

        let m = &sample.metrics;
        if status == HealthStatus::Healthy {
            info!(
                status = status.as_str(),
                total_requests = m.total_requests,
                successful = m.successful_assignments,
                failed = m.failed_assignments,
                assigned = m.assigned_agents,
                available = m.available_agents,
                utilization = m.utilization_rate,
                avg_response_ms = m.average_response_time_ms,
                reclaimed,
                "Coordination health"
            );
        } else {
            warn!(
                status = status.as_str(),
                assigned = m.assigned_agents,
                available = m.available_agents,
                utilization = m.utilization_rate,
                exhausted_tiers = ?sample.exhausted_tiers,
                reclaimed,
                "Coordination health degraded"
            );
        }

        let mut history = self.history.write();
        history.push_back(sample.clone());
        while history.len() > self.config.history_size.max(1) {
            history.pop_front();
        }

        sample
    }
}
