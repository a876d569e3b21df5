//! Coordination counters.
//!
//! The counters are plain fields: they are only touched inside the
//! coordinator's critical section, together with the agent state they
//! describe.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use uao_common::TierId;

#[derive(Debug, Clone, Default)]
pub struct CoordinationMetrics {
    pub total_requests: u64,
    pub successful_assignments: u64,
    pub failed_assignments: u64,
    pub releases: u64,
    pub idle_reclaims: u64,
    /// Running mean over successful assignments, in microseconds
    pub average_response_us: f64,
    active_by_tier: HashMap<TierId, usize>,
}

impl CoordinationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, tier: &TierId, elapsed: Duration) {
        self.total_requests += 1;
        self.successful_assignments += 1;

        let n = self.successful_assignments as f64;
        let sample = elapsed.as_secs_f64() * 1_000_000.0;
        self.average_response_us = (self.average_response_us * (n - 1.0) + sample) / n;

        *self.active_by_tier.entry(tier.clone()).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_assignments += 1;
    }

    pub fn record_release(&mut self, tier: &TierId, idle: bool) {
        self.releases += 1;
        if idle {
            self.idle_reclaims += 1;
        }
        if let Some(active) = self.active_by_tier.get_mut(tier) {
            *active = active.saturating_sub(1);
        }
    }

    pub fn active(&self, tier: &TierId) -> usize {
        self.active_by_tier.get(tier).copied().unwrap_or(0)
    }

    /// Copy the counters together with the pool occupancy they belong to.
    pub fn snapshot(&self, total_agents: usize, assigned_agents: usize) -> MetricsSnapshot {
        let utilization_rate = if total_agents == 0 {
            0.0
        } else {
            assigned_agents as f64 / total_agents as f64
        };

        MetricsSnapshot {
            total_requests: self.total_requests,
            successful_assignments: self.successful_assignments,
            failed_assignments: self.failed_assignments,
            releases: self.releases,
            idle_reclaims: self.idle_reclaims,
            total_agents,
            assigned_agents,
            available_agents: total_agents.saturating_sub(assigned_agents),
            utilization_rate,
            average_response_time_ms: self.average_response_us / 1_000.0,
            active_by_tier: self
                .active_by_tier
                .iter()
                .map(|(tier, &count)| (tier.to_string(), count))
                .collect(),
        }
    }
}

/// Read-only copy of the coordinator's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_assignments: u64,
    pub failed_assignments: u64,
    pub releases: u64,
    pub idle_reclaims: u64,
    pub total_agents: usize,
    pub assigned_agents: usize,
    pub available_agents: usize,
    pub utilization_rate: f64,
    pub average_response_time_ms: f64,
    pub active_by_tier: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_average() {
        let mut metrics = CoordinationMetrics::new();
        let tier = TierId::from("team");

        metrics.record_success(&tier, Duration::from_micros(100));
        metrics.record_success(&tier, Duration::from_micros(300));
        metrics.record_failure();
        metrics.record_success(&tier, Duration::from_micros(200));

        assert!((metrics.average_response_us - 200.0).abs() < 1e-6);
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.successful_assignments, 3);
        assert_eq!(metrics.failed_assignments, 1);
        assert_eq!(metrics.active(&tier), 3);
    }

    #[test]
    fn test_release_decrements_tier() {
        let mut metrics = CoordinationMetrics::new();
        let tier = TierId::from("group");
        metrics.record_success(&tier, Duration::ZERO);
        metrics.record_release(&tier, true);
        metrics.record_release(&tier, false);

        assert_eq!(metrics.active(&tier), 0);
        assert_eq!(metrics.releases, 2);
        assert_eq!(metrics.idle_reclaims, 1);
    }

    #[test]
    fn test_snapshot_utilization() {
        let mut metrics = CoordinationMetrics::new();
        metrics.record_success(&TierId::from("a"), Duration::from_millis(2));

        let snapshot = metrics.snapshot(8, 2);
        assert_eq!(snapshot.available_agents, 6);
        assert!((snapshot.utilization_rate - 0.25).abs() < f64::EPSILON);
        assert!((snapshot.average_response_time_ms - 2.0).abs() < 1e-9);
        assert_eq!(snapshot.active_by_tier.get("a"), Some(&1));
    }

    #[test]
    fn test_snapshot_empty_pool() {
        let snapshot = CoordinationMetrics::new().snapshot(0, 0);
        assert_eq!(snapshot.utilization_rate, 0.0);
    }
}
