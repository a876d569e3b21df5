//! Agent records tracked by the coordinator's pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UaoError;
use crate::tier::TierId;

const ID_PREFIX: &str = "wfa";

/// Identity of an agent: its sector and its slot within that sector.
///
/// Both components are 1-based. The textual form is `wfa-<sector>-<slot>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId {
    pub sector: u32,
    pub slot: u32,
}

impl AgentId {
    pub fn new(sector: u32, slot: u32) -> Self {
        Self { sector, slot }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", ID_PREFIX, self.sector, self.slot)
    }
}

impl FromStr for AgentId {
    type Err = UaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || UaoError::InvalidAgentId(s.to_string());

        let mut parts = s.split('-');
        if parts.next() != Some(ID_PREFIX) {
            return Err(invalid());
        }
        let sector = parts.next().and_then(parse_index).ok_or_else(invalid)?;
        let slot = parts.next().and_then(parse_index).ok_or_else(invalid)?;
        if parts.next().is_some() || sector == 0 || slot == 0 {
            return Err(invalid());
        }

        Ok(Self { sector, slot })
    }
}

/// Digits only; `u32::from_str` alone would accept a leading `+`.
fn parse_index(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Available,
    Assigned,
}

/// A unit of assignable capacity.
///
/// Values handed out by the coordinator are snapshots; the authoritative
/// record stays inside the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,

    pub status: AgentStatus,

    /// Tier currently holding the agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierId>,

    /// Last activity (Unix millis)
    pub last_activity_ms: u64,

    /// Number of times this agent has been assigned. A holder whose snapshot
    /// generation no longer matches has lost its lease.
    pub generation: u64,
}

impl Agent {
    pub fn new(id: AgentId, now_ms: u64) -> Self {
        Self {
            id,
            status: AgentStatus::Available,
            tier: None,
            last_activity_ms: now_ms,
            generation: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Available
    }

    /// Whether this record still represents the lease described by `held`.
    pub fn same_lease(&self, held: &Agent) -> bool {
        self.id == held.id
            && self.status == AgentStatus::Assigned
            && self.generation == held.generation
            && self.tier == held.tier
    }
}
