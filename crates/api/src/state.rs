//! Application state for the API server.

use std::sync::Arc;
use uao_coordinator::{Coordinator, CoordinatorConfig, HealthReporter, HealthSample};

/// Shared application state for the API server.
pub struct AppState {
    /// The coordinator that owns every agent
    pub coordinator: Arc<Coordinator>,

    /// Reporter whose latest sample backs `/health`
    pub reporter: Arc<HealthReporter>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build a coordinator and reporter from `config`.
    pub fn new(config: &CoordinatorConfig) -> uao_common::Result<Self> {
        let coordinator = Arc::new(Coordinator::new(config)?);
        let reporter = Arc::new(HealthReporter::new(
            coordinator.clone(),
            config.health.clone(),
        ));
        Ok(Self::from_parts(coordinator, reporter))
    }

    pub fn from_parts(coordinator: Arc<Coordinator>, reporter: Arc<HealthReporter>) -> Self {
        Self {
            coordinator,
            reporter,
            start_time: std::time::Instant::now(),
        }
    }

    /// Latest reporter sample, taking one if the reporter has not run yet.
    pub fn current_health(&self) -> HealthSample {
        self.reporter
            .latest()
            .unwrap_or_else(|| self.reporter.sample())
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
