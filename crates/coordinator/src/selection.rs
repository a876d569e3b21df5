//! Priority-based choice among available candidates.

use rand::Rng;
use std::cmp::Reverse;
use uao_common::{Agent, AgentId, Priority};

/// Pick one agent from `candidates`.
///
/// - `Critical`: lowest sector, then lowest slot.
/// - `High`: most recent `last_activity_ms`, ties to lowest sector then slot.
/// - `Normal`: uniform pick from `rng`.
///
/// Returns `None` only when there are no candidates.
pub fn select_agent<R: Rng>(
    candidates: &[&Agent],
    priority: Priority,
    rng: &mut R,
) -> Option<AgentId> {
    if candidates.is_empty() {
        return None;
    }

    let chosen = match priority {
        Priority::Critical => candidates.iter().min_by_key(|a| a.id)?,
        Priority::High => candidates
            .iter()
            .min_by_key(|a| (Reverse(a.last_activity_ms), a.id))?,
        Priority::Normal => &candidates[rng.gen_range(0..candidates.len())],
    };

    Some(chosen.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn agent(sector: u32, slot: u32, last_activity_ms: u64) -> Agent {
        Agent::new(AgentId::new(sector, slot), last_activity_ms)
    }

    #[test]
    fn test_empty_candidates() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_agent(&[], Priority::Critical, &mut rng).is_none());
        assert!(select_agent(&[], Priority::Normal, &mut rng).is_none());
    }

    #[test]
    fn test_critical_picks_lowest_sector_then_slot() {
        let agents = [agent(3, 1, 0), agent(2, 2, 0), agent(2, 1, 0), agent(4, 1, 0)];
        let refs: Vec<&Agent> = agents.iter().collect();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..5 {
            assert_eq!(
                select_agent(&refs, Priority::Critical, &mut rng),
                Some(AgentId::new(2, 1))
            );
        }
    }

    #[test]
    fn test_high_picks_most_recent_activity() {
        let agents = [agent(1, 1, 10), agent(2, 1, 30), agent(3, 1, 20)];
        let refs: Vec<&Agent> = agents.iter().collect();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            select_agent(&refs, Priority::High, &mut rng),
            Some(AgentId::new(2, 1))
        );
    }

    #[test]
    fn test_high_ties_break_to_lowest_sector() {
        let agents = [agent(3, 1, 50), agent(1, 2, 50), agent(2, 1, 50), agent(1, 1, 5)];
        let refs: Vec<&Agent> = agents.iter().collect();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            select_agent(&refs, Priority::High, &mut rng),
            Some(AgentId::new(1, 2))
        );
    }

    #[test]
    fn test_normal_is_reproducible_with_seed() {
        let agents: Vec<Agent> = (1..=20).map(|s| agent(s, 1, 0)).collect();
        let refs: Vec<&Agent> = agents.iter().collect();

        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| select_agent(&refs, Priority::Normal, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };

        assert_eq!(picks(42), picks(42));
        assert!(picks(42).iter().all(|id| id.sector >= 1 && id.sector <= 20));
    }

    #[test]
    fn test_normal_covers_candidates() {
        let agents: Vec<Agent> = (1..=4).map(|s| agent(s, 1, 0)).collect();
        let refs: Vec<&Agent> = agents.iter().collect();
        let mut rng = StdRng::seed_from_u64(7);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(select_agent(&refs, Priority::Normal, &mut rng).unwrap());
        }
        assert_eq!(seen.len(), 4);
    }
}
