//! The agent pool: every agent record, laid out sector by sector.
//!
//! Agents live in one flat vector indexed by `(sector - 1) * per_sector +
//! (slot - 1)`, so sector scans are contiguous slices and lookups by id are
//! O(1). The pool has no locking of its own; the coordinator owns it and
//! serializes every mutation.

use tracing::debug;
use uao_common::{Agent, AgentId, AgentStatus, Result, TierId, UaoError};

use crate::sectors::SectorRange;

/// Upper bound on `sector_count × per_sector`.
pub const MAX_POOL_AGENTS: usize = 10_000_000;

#[derive(Debug, Clone)]
pub struct AgentPool {
    sector_count: u32,
    per_sector: u32,
    agents: Vec<Agent>,
    assigned: usize,
}

impl AgentPool {
    /// Create `sector_count × per_sector` available agents.
    pub fn initialize(sector_count: u32, per_sector: u32, now_ms: u64) -> Result<Self> {
        if sector_count == 0 || per_sector == 0 {
            return Err(UaoError::InvalidPool(format!(
                "sector count and capacity must be positive (got {sector_count} x {per_sector})"
            )));
        }

        let total = (sector_count as usize)
            .checked_mul(per_sector as usize)
            .filter(|total| *total <= MAX_POOL_AGENTS)
            .ok_or_else(|| {
                UaoError::InvalidPool(format!(
                    "{sector_count} x {per_sector} exceeds {MAX_POOL_AGENTS} agents"
                ))
            })?;

        let mut agents = Vec::with_capacity(total);
        for sector in 1..=sector_count {
            for slot in 1..=per_sector {
                agents.push(Agent::new(AgentId::new(sector, slot), now_ms));
            }
        }

        debug!(sectors = sector_count, per_sector, total, "Agent pool initialized");

        Ok(Self {
            sector_count,
            per_sector,
            agents,
            assigned: 0,
        })
    }

    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    pub fn per_sector(&self) -> u32 {
        self.per_sector
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn index_of(&self, id: AgentId) -> Option<usize> {
        if id.sector == 0
            || id.sector > self.sector_count
            || id.slot == 0
            || id.slot > self.per_sector
        {
            return None;
        }
        Some((id.sector as usize - 1) * self.per_sector as usize + (id.slot as usize - 1))
    }

    fn sector_slice(&self, sector: u32) -> &[Agent] {
        if sector == 0 || sector > self.sector_count {
            return &[];
        }
        let per = self.per_sector as usize;
        let start = (sector as usize - 1) * per;
        &self.agents[start..start + per]
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.index_of(id).map(|i| &self.agents[i])
    }

    /// All agents in `sectors`, in the order the sectors are given and slot
    /// order within each. Unknown sectors are skipped.
    pub fn agents_in_sectors(&self, sectors: &[u32]) -> Vec<&Agent> {
        sectors
            .iter()
            .flat_map(|&sector| self.sector_slice(sector))
            .collect()
    }

    /// Available agents in a sector range, sector-then-slot order.
    pub fn available_in_range(&self, range: SectorRange) -> impl Iterator<Item = &Agent> {
        range
            .sectors()
            .flat_map(move |sector| self.sector_slice(sector))
            .filter(|agent| agent.is_available())
    }

    /// Every currently assigned agent.
    pub fn assigned(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|agent| !agent.is_available())
    }

    /// `(available, assigned)`; always sums to `len()`.
    pub fn counts(&self) -> (usize, usize) {
        (self.agents.len() - self.assigned, self.assigned)
    }

    /// Assign an available agent to `tier`.
    ///
    /// Returns `Ok(false)` for an id outside the pool. Calling this on an
    /// agent that is already assigned is a caller bug and is rejected with
    /// `AlreadyAssigned` rather than silently moving the agent.
    pub fn mark_assigned(&mut self, id: AgentId, tier: &TierId, now_ms: u64) -> Result<bool> {
        let Some(i) = self.index_of(id) else {
            return Ok(false);
        };
        let agent = &mut self.agents[i];
        if agent.status == AgentStatus::Assigned {
            return Err(UaoError::AlreadyAssigned(id));
        }

        agent.status = AgentStatus::Assigned;
        agent.tier = Some(tier.clone());
        agent.last_activity_ms = now_ms;
        agent.generation += 1;
        self.assigned += 1;
        Ok(true)
    }

    /// Return an agent to the pool. Returns the tier that held it, or `None`
    /// if the id is unknown or the agent was already available.
    pub fn mark_available(&mut self, id: AgentId, now_ms: u64) -> Option<TierId> {
        let i = self.index_of(id)?;
        let agent = &mut self.agents[i];
        if agent.status == AgentStatus::Available {
            return None;
        }

        agent.status = AgentStatus::Available;
        agent.last_activity_ms = now_ms;
        self.assigned -= 1;
        // An assigned agent always carries its tier.
        agent.tier.take()
    }

    /// Refresh the activity timestamp of an assigned agent.
    pub fn touch(&mut self, id: AgentId, now_ms: u64) -> bool {
        match self.index_of(id).map(|i| &mut self.agents[i]) {
            Some(agent) if agent.status == AgentStatus::Assigned => {
                agent.last_activity_ms = now_ms;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(name: &str) -> TierId {
        TierId::from(name)
    }

    #[test]
    fn test_oversized_pool_is_rejected() {
        let err = AgentPool::initialize(u32::MAX, u32::MAX, 0).unwrap_err();
        assert!(matches!(err, UaoError::InvalidPool(_)));

        let err = AgentPool::initialize(1, (MAX_POOL_AGENTS + 1) as u32, 0).unwrap_err();
        assert!(matches!(err, UaoError::InvalidPool(_)));
    }

    #[test]
    fn test_initialize_creates_all_agents() {
        let pool = AgentPool::initialize(4, 2, 100).unwrap();
        assert_eq!(pool.len(), 8);
        assert_eq!(pool.counts(), (8, 0));
        assert!(pool.get(AgentId::new(4, 2)).unwrap().is_available());
        assert!(pool.get(AgentId::new(5, 1)).is_none());
        assert!(pool.get(AgentId::new(1, 3)).is_none());
    }

    #[test]
    fn test_initialize_rejects_zero() {
        assert!(matches!(
            AgentPool::initialize(0, 2, 0),
            Err(UaoError::InvalidPool(_))
        ));
        assert!(matches!(
            AgentPool::initialize(2, 0, 0),
            Err(UaoError::InvalidPool(_))
        ));
    }

    #[test]
    fn test_identities_are_unique_and_ordered() {
        let pool = AgentPool::initialize(3, 4, 0).unwrap();
        let ids: Vec<AgentId> = pool.agents_in_sectors(&[1, 2, 3]).iter().map(|a| a.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_agents_in_sectors() {
        let pool = AgentPool::initialize(4, 2, 0).unwrap();
        let ids: Vec<AgentId> = pool.agents_in_sectors(&[3, 9, 1]).iter().map(|a| a.id).collect();
        assert_eq!(
            ids,
            vec![
                AgentId::new(3, 1),
                AgentId::new(3, 2),
                AgentId::new(1, 1),
                AgentId::new(1, 2)
            ]
        );
    }

    #[test]
    fn test_mark_assigned_and_available() {
        let mut pool = AgentPool::initialize(2, 2, 0).unwrap();
        let id = AgentId::new(1, 2);

        assert!(pool.mark_assigned(id, &tier("team"), 50).unwrap());
        let agent = pool.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Assigned);
        assert_eq!(agent.tier, Some(tier("team")));
        assert_eq!(agent.last_activity_ms, 50);
        assert_eq!(agent.generation, 1);
        assert_eq!(pool.counts(), (3, 1));

        assert_eq!(pool.mark_available(id, 60), Some(tier("team")));
        assert!(pool.get(id).unwrap().is_available());
        assert!(pool.get(id).unwrap().tier.is_none());
        assert_eq!(pool.counts(), (4, 0));
    }

    #[test]
    fn test_mark_available_is_idempotent() {
        let mut pool = AgentPool::initialize(1, 1, 0).unwrap();
        let id = AgentId::new(1, 1);
        assert_eq!(pool.mark_available(id, 0), None);
        assert_eq!(pool.mark_available(AgentId::new(7, 7), 0), None);
        assert_eq!(pool.counts(), (1, 0));
    }

    #[test]
    fn test_mark_assigned_twice_is_rejected() {
        let mut pool = AgentPool::initialize(1, 1, 0).unwrap();
        let id = AgentId::new(1, 1);
        pool.mark_assigned(id, &tier("team"), 0).unwrap();

        let err = pool.mark_assigned(id, &tier("group"), 0).unwrap_err();
        assert!(matches!(err, UaoError::AlreadyAssigned(a) if a == id));
        assert_eq!(pool.get(id).unwrap().tier, Some(tier("team")));
        assert_eq!(pool.counts(), (0, 1));
    }

    #[test]
    fn test_mark_assigned_unknown_id() {
        let mut pool = AgentPool::initialize(1, 1, 0).unwrap();
        assert!(!pool.mark_assigned(AgentId::new(2, 1), &tier("team"), 0).unwrap());
    }

    #[test]
    fn test_generation_increments_per_assignment() {
        let mut pool = AgentPool::initialize(1, 1, 0).unwrap();
        let id = AgentId::new(1, 1);
        pool.mark_assigned(id, &tier("team"), 0).unwrap();
        pool.mark_available(id, 0);
        pool.mark_assigned(id, &tier("team"), 0).unwrap();
        assert_eq!(pool.get(id).unwrap().generation, 2);
    }

    #[test]
    fn test_available_in_range_skips_assigned() {
        let mut pool = AgentPool::initialize(4, 2, 0).unwrap();
        pool.mark_assigned(AgentId::new(3, 1), &tier("b"), 0).unwrap();

        let ids: Vec<AgentId> = pool
            .available_in_range(SectorRange { start: 3, end: 4 })
            .map(|a| a.id)
            .collect();
        assert_eq!(
            ids,
            vec![AgentId::new(3, 2), AgentId::new(4, 1), AgentId::new(4, 2)]
        );
    }

    #[test]
    fn test_touch_only_assigned() {
        let mut pool = AgentPool::initialize(1, 2, 0).unwrap();
        let id = AgentId::new(1, 1);
        assert!(!pool.touch(id, 10));

        pool.mark_assigned(id, &tier("team"), 10).unwrap();
        assert!(pool.touch(id, 99));
        assert_eq!(pool.get(id).unwrap().last_activity_ms, 99);
    }
}
