//! Configuration for the coordinator.
//!
//! Sizing comes from a TOML file (or defaults) and may be overridden by
//! secrets at startup. Once the coordinator is built the sizing is fixed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use uao_common::{Result, TierId, UaoError};

use crate::pool::MAX_POOL_AGENTS;
use crate::retry::RetryPolicy;
use crate::secrets::SecretProvider;

/// Secret holding the sector count override.
pub const SECTOR_COUNT_SECRET: &str = "UAO_SECTOR_COUNT";
/// Secret holding the per-sector capacity override.
pub const AGENTS_PER_SECTOR_SECRET: &str = "UAO_AGENTS_PER_SECTOR";
/// Secret holding a comma-separated tier list override.
pub const TIERS_SECRET: &str = "UAO_TIERS";

/// Main coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Pool sizing
    #[serde(default)]
    pub pool: PoolConfig,

    /// Client tiers in declaration order. Sector ranges follow this order.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierId>,

    /// Retry behaviour used by gateways when a tier is exhausted
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Health reporter and idle sweep settings
    #[serde(default)]
    pub health: HealthConfig,

    /// Capacity of the coordination event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Seed for NORMAL-priority selection. Unset = seeded from entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_sector_count")]
    pub sector_count: u32,

    #[serde(default = "default_agents_per_sector")]
    pub agents_per_sector: u32,
}

impl PoolConfig {
    pub fn total_agents(&self) -> usize {
        (self.sector_count as usize).saturating_mul(self.agents_per_sector as usize)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sector_count: default_sector_count(),
            agents_per_sector: default_agents_per_sector(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Interval between reporter ticks
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,

    /// Assigned agents idle for at least this long are reclaimed
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_ms: u64,

    /// Utilization at or above which the pool is reported degraded
    #[serde(default = "default_degraded_utilization")]
    pub degraded_utilization: f64,

    /// Utilization at or above which the pool is reported critical
    #[serde(default = "default_critical_utilization")]
    pub critical_utilization: f64,

    /// Number of samples kept in memory
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval(),
            idle_threshold_ms: default_idle_threshold(),
            degraded_utilization: default_degraded_utilization(),
            critical_utilization: default_critical_utilization(),
            history_size: default_history_size(),
        }
    }
}

fn default_sector_count() -> u32 {
    30
}

fn default_agents_per_sector() -> u32 {
    1000
}

fn default_tiers() -> Vec<TierId> {
    ["owner-subscriber", "team", "group", "practitioner", "enterprise"]
        .into_iter()
        .map(TierId::from)
        .collect()
}

fn default_event_capacity() -> usize {
    1024
}

fn default_sample_interval() -> u64 {
    30_000
}

fn default_idle_threshold() -> u64 {
    300_000
}

fn default_degraded_utilization() -> f64 {
    0.75
}

fn default_critical_utilization() -> f64 {
    0.95
}

fn default_history_size() -> usize {
    100
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            tiers: default_tiers(),
            retry: RetryPolicy::default(),
            health: HealthConfig::default(),
            event_capacity: default_event_capacity(),
            rng_seed: None,
        }
    }
}

impl CoordinatorConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// On Unix the file must be a regular file and must not be
    /// world-writable, since it decides how capacity is split between tiers.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        Self::from_file_unchecked(path)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check sizing, tier list and thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.pool.sector_count == 0 {
            return Err(UaoError::Config("pool.sector_count must be positive".into()));
        }
        if self.pool.agents_per_sector == 0 {
            return Err(UaoError::Config(
                "pool.agents_per_sector must be positive".into(),
            ));
        }
        if self.pool.total_agents() > MAX_POOL_AGENTS {
            return Err(UaoError::Config(format!(
                "pool of {} x {} agents exceeds the limit of {MAX_POOL_AGENTS}",
                self.pool.sector_count, self.pool.agents_per_sector
            )));
        }
        if self.tiers.is_empty() {
            return Err(UaoError::Config("at least one tier is required".into()));
        }
        if self.tiers.len() > self.pool.sector_count as usize {
            return Err(UaoError::Config(format!(
                "{} tiers cannot share {} sectors",
                self.tiers.len(),
                self.pool.sector_count
            )));
        }
        for (i, tier) in self.tiers.iter().enumerate() {
            if tier.as_str().trim().is_empty() {
                return Err(UaoError::Config("tier names must not be empty".into()));
            }
            if self.tiers[..i].contains(tier) {
                return Err(UaoError::Config(format!("duplicate tier: {tier}")));
            }
        }
        if self.event_capacity == 0 {
            return Err(UaoError::Config("event_capacity must be positive".into()));
        }

        let health = &self.health;
        if health.sample_interval_ms == 0 {
            return Err(UaoError::Config(
                "health.sample_interval_ms must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&health.degraded_utilization)
            || !(0.0..=1.0).contains(&health.critical_utilization)
            || health.degraded_utilization > health.critical_utilization
        {
            return Err(UaoError::Config(
                "health utilization thresholds must satisfy 0 <= degraded <= critical <= 1".into(),
            ));
        }

        Ok(())
    }

    /// Override sizing from secrets.
    ///
    /// A missing secret keeps the configured value. A secret that is present
    /// but cannot be parsed is an error, as is a store failure other than
    /// `SecretNotFound`.
    pub async fn apply_secrets(&mut self, provider: &dyn SecretProvider) -> Result<()> {
        if let Some(value) = optional_secret(provider, SECTOR_COUNT_SECRET).await? {
            self.pool.sector_count = parse_count(SECTOR_COUNT_SECRET, &value)?;
        }
        if let Some(value) = optional_secret(provider, AGENTS_PER_SECTOR_SECRET).await? {
            self.pool.agents_per_sector = parse_count(AGENTS_PER_SECTOR_SECRET, &value)?;
        }
        if let Some(value) = optional_secret(provider, TIERS_SECRET).await? {
            self.tiers = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(TierId::from)
                .collect();
        }

        info!(
            sectors = self.pool.sector_count,
            agents_per_sector = self.pool.agents_per_sector,
            tiers = self.tiers.len(),
            "Resolved coordinator sizing"
        );

        self.validate()
    }
}

async fn optional_secret(provider: &dyn SecretProvider, name: &str) -> Result<Option<String>> {
    match provider.get_secret(name).await {
        Ok(value) => Ok(Some(value)),
        Err(UaoError::SecretNotFound(_)) => {
            debug!(secret = name, "Secret not set, keeping configured value");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn parse_count(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| UaoError::Config(format!("{name} is not a valid count ({value:?}): {e}")))
}

/// Validate config file permissions on Unix systems.
#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;
    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretProvider;
    use std::io::Write;

    const TOML_CONFIG: &str = r#"
tiers = ["alpha", "beta"]
rng_seed = 7

[pool]
sector_count = 4
agents_per_sector = 2

[retry]
max_retries = 5
initial_delay_ms = 10
max_delay_ms = 100
backoff_multiplier = 3.0
timeout_ms = 1000

[health]
idle_threshold_ms = 60000
"#;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoordinatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tiers.len(), 5);
        assert_eq!(config.pool.total_agents(), 30_000);
    }

    #[test]
    fn test_deserialize_from_toml() {
        let config: CoordinatorConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.pool.sector_count, 4);
        assert_eq!(config.pool.agents_per_sector, 2);
        assert_eq!(config.tiers, vec![TierId::from("alpha"), TierId::from("beta")]);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.health.idle_threshold_ms, 60_000);
        assert_eq!(config.health.history_size, 100);
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: CoordinatorConfig = toml::from_str("").unwrap();
        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.tiers.len(), 5);
    }

    #[test]
    fn test_validate_rejects_bad_sizing() {
        let mut config = CoordinatorConfig::default();
        config.pool.sector_count = 0;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.pool.agents_per_sector = 0;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.pool.sector_count = 3;
        assert!(config.validate().is_err(), "5 tiers cannot share 3 sectors");
    }

    #[test]
    fn test_validate_rejects_oversized_pool() {
        let mut config = CoordinatorConfig::default();
        config.pool.sector_count = u32::MAX;
        config.pool.agents_per_sector = u32::MAX;
        assert!(matches!(config.validate(), Err(UaoError::Config(_))));

        config.pool.sector_count = 10;
        config.pool.agents_per_sector = (MAX_POOL_AGENTS / 10) as u32;
        config.validate().unwrap();

        config.pool.agents_per_sector += 1;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_oversized_secrets_are_a_config_error() {
        let provider = StaticSecretProvider::new()
            .with_secret(SECTOR_COUNT_SECRET, "4294967295")
            .with_secret(AGENTS_PER_SECTOR_SECRET, "4294967295");

        let mut config = CoordinatorConfig::default();
        let err = config.apply_secrets(&provider).await.unwrap_err();
        assert!(matches!(err, UaoError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_tiers() {
        let mut config = CoordinatorConfig::default();
        config.tiers.clear();
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.tiers.push(TierId::from("team"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = CoordinatorConfig::default();
        config.health.degraded_utilization = 0.9;
        config.health.critical_utilization = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOML_CONFIG.as_bytes()).unwrap();

        let config = CoordinatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pool.sector_count, 4);
    }

    #[test]
    fn test_from_file_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[pool]\nsector_count = 0\n").unwrap();

        assert!(CoordinatorConfig::from_file_unchecked(file.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_from_file_rejects_world_writable() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOML_CONFIG.as_bytes()).unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o666)).unwrap();

        assert!(CoordinatorConfig::from_file(file.path()).is_err());
        assert!(CoordinatorConfig::from_file_unchecked(file.path()).is_ok());
    }

    #[tokio::test]
    async fn test_apply_secrets_overrides_sizing() {
        let provider = StaticSecretProvider::new()
            .with_secret(SECTOR_COUNT_SECRET, "8")
            .with_secret(AGENTS_PER_SECTOR_SECRET, " 16 ")
            .with_secret(TIERS_SECRET, "gold, silver,,bronze");

        let mut config = CoordinatorConfig::default();
        config.apply_secrets(&provider).await.unwrap();

        assert_eq!(config.pool.sector_count, 8);
        assert_eq!(config.pool.agents_per_sector, 16);
        assert_eq!(
            config.tiers,
            vec![TierId::from("gold"), TierId::from("silver"), TierId::from("bronze")]
        );
    }

    #[tokio::test]
    async fn test_apply_secrets_keeps_values_when_missing() {
        let provider = StaticSecretProvider::new();
        let mut config = CoordinatorConfig::default();
        config.apply_secrets(&provider).await.unwrap();
        assert_eq!(config.pool, PoolConfig::default());
    }

    #[tokio::test]
    async fn test_apply_secrets_rejects_garbage() {
        let provider = StaticSecretProvider::new().with_secret(SECTOR_COUNT_SECRET, "lots");
        let mut config = CoordinatorConfig::default();
        let err = config.apply_secrets(&provider).await.unwrap_err();
        assert!(matches!(err, UaoError::Config(_)));
    }
}
