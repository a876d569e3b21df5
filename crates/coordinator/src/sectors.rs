//! Static partitioning of sectors across client tiers.
//!
//! Sectors are numbered `1..=total`. Each tier receives one contiguous
//! range; ranges follow tier declaration order and the last tier absorbs the
//! remainder when the split is uneven. The table is computed once and never
//! mutated.

use serde::Serialize;
use std::collections::HashMap;
use uao_common::{Result, TierId, UaoError};

/// An inclusive, 1-based range of sector numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectorRange {
    pub start: u32,
    pub end: u32,
}

impl SectorRange {
    pub fn contains(&self, sector: u32) -> bool {
        (self.start..=self.end).contains(&sector)
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn sectors(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// Tier → sector range table.
#[derive(Debug, Clone)]
pub struct SectorAssignments {
    ordered: Vec<(TierId, SectorRange)>,
    index: HashMap<TierId, usize>,
    total_sectors: u32,
}

impl SectorAssignments {
    pub fn range(&self, tier: &TierId) -> Option<SectorRange> {
        self.index.get(tier).map(|&i| self.ordered[i].1)
    }

    pub fn contains_tier(&self, tier: &TierId) -> bool {
        self.index.contains_key(tier)
    }

    /// The tier owning `sector`, if the sector exists.
    pub fn tier_for_sector(&self, sector: u32) -> Option<&TierId> {
        self.ordered
            .iter()
            .find(|(_, range)| range.contains(sector))
            .map(|(tier, _)| tier)
    }

    /// Tiers and their ranges in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&TierId, SectorRange)> {
        self.ordered.iter().map(|(tier, range)| (tier, *range))
    }

    pub fn tiers(&self) -> impl Iterator<Item = &TierId> {
        self.ordered.iter().map(|(tier, _)| tier)
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Split `total_sectors` across `tiers`.
///
/// Every tier gets `total / tiers` sectors; the last tier also takes the
/// `total % tiers` leftover sectors.
pub fn compute_assignments(tiers: &[TierId], total_sectors: u32) -> Result<SectorAssignments> {
    if tiers.is_empty() {
        return Err(UaoError::InvalidAssignment("no tiers declared".into()));
    }
    if total_sectors == 0 {
        return Err(UaoError::InvalidAssignment("no sectors to assign".into()));
    }
    let tier_count = u32::try_from(tiers.len())
        .map_err(|_| UaoError::InvalidAssignment("too many tiers".into()))?;
    if tier_count > total_sectors {
        return Err(UaoError::InvalidAssignment(format!(
            "{tier_count} tiers cannot share {total_sectors} sectors"
        )));
    }

    let per_tier = total_sectors / tier_count;
    let mut ordered = Vec::with_capacity(tiers.len());
    let mut index = HashMap::with_capacity(tiers.len());

    for (i, tier) in tiers.iter().enumerate() {
        if index.insert(tier.clone(), i).is_some() {
            return Err(UaoError::InvalidAssignment(format!("duplicate tier: {tier}")));
        }

        let i = i as u32;
        let start = i * per_tier + 1;
        let end = if i + 1 == tier_count {
            total_sectors
        } else {
            (i + 1) * per_tier
        };
        ordered.push((tier.clone(), SectorRange { start, end }));
    }

    Ok(SectorAssignments {
        ordered,
        index,
        total_sectors,
    })
}
