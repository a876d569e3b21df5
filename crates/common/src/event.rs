//! Lifecycle events published by the coordinator.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::priority::Priority;
use crate::tier::TierId;

/// Why an agent went back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// Released by its holder
    Explicit,
    /// Reclaimed by the idle sweep
    IdleSweep,
}

/// Event emitted after a coordination state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinationEvent {
    AgentAssigned {
        agent: Agent,
        tier: TierId,
        priority: Priority,
        /// Time spent selecting and assigning, in microseconds
        elapsed_us: u64,
    },
    AgentReleased {
        agent: Agent,
        previous_tier: TierId,
        reason: ReleaseReason,
    },
    CoordinationFailed {
        tier: TierId,
        priority: Priority,
        reason: String,
    },
}

impl CoordinationEvent {
    /// The tier the event concerns.
    pub fn tier(&self) -> &TierId {
        match self {
            Self::AgentAssigned { tier, .. } => tier,
            Self::AgentReleased { previous_tier, .. } => previous_tier,
            Self::CoordinationFailed { tier, .. } => tier,
        }
    }
}
