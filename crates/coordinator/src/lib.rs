//! Agent coordination core for tiered integration gateways.
//!
//! A fixed pool of agents is split into sectors; each client tier owns a
//! contiguous slice of sectors. Gateways ask the coordinator for agents on
//! behalf of their tier, the coordinator picks one by priority, and a health
//! reporter samples metrics and reclaims idle agents.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐  ┌──────────────┐        ┌──────────────────┐
//!  │ TierGateway  │  │ TierGateway  │  ...   │  HealthReporter  │
//!  │ (enterprise) │  │    (team)    │        │  sample / sweep  │
//!  └──────┬───────┘  └──────┬───────┘        └────────┬─────────┘
//!         │ request/release │                         │
//!         ▼                 ▼                         ▼
//!  ┌──────────────────────────────────────────────────────────┐
//!  │                 Coordinator (one mutex)                  │
//!  │  SectorAssignments ─► AgentPool ─► selection ─► metrics  │
//!  └────────────────────────────┬─────────────────────────────┘
//!                               │ broadcast
//!                               ▼
//!                      CoordinationEvent subscribers
//! ```

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod pool;
pub mod retry;
pub mod secrets;
pub mod sectors;
pub mod selection;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CoordinatorConfig, HealthConfig, PoolConfig};
pub use coordinator::Coordinator;
pub use gateway::{GatewayHealth, TierGateway};
pub use health::{HealthReporter, HealthSample, HealthStatus};
pub use metrics::MetricsSnapshot;
pub use retry::RetryPolicy;
pub use secrets::{EnvSecretProvider, SecretProvider, StaticSecretProvider};
pub use sectors::{compute_assignments, SectorAssignments, SectorRange};
pub use uao_common::{
    Agent, AgentId, AgentStatus, CoordinationEvent, Priority, ReleaseReason, Result, TierId,
    UaoError,
};
