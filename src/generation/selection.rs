//! Constrained weighted sampling of encounter types.
//!
//! The candidate table for a level is built once (distribution, region,
//! discovery exclusion, grouping depth gates); each position then draws from
//! that table minus every type and grouping already placed on the level.

use std::collections::BTreeMap;

use crate::balance::{DepthConstraint, EncounterGrouping, EncounterType};
use crate::random::RandomSource;

pub type WeightTable = Vec<(EncounterType, f64)>;

/// Candidate weights for one depth, normalized to sum to 1.
///
/// Zero weights are dropped, `discovery_site` is removed when
/// `exclude_discovery` is set, and types whose grouping is gated out of
/// `depth` are removed before normalizing.
pub fn candidate_weights(
    distribution: &BTreeMap<EncounterType, f64>,
    depth: i32,
    depth_constraints: &BTreeMap<EncounterGrouping, DepthConstraint>,
    exclude_discovery: bool,
) -> WeightTable {
    let table: WeightTable = distribution
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .filter(|(t, _)| !(exclude_discovery && **t == EncounterType::DiscoverySite))
        .filter(|(t, _)| {
            depth_constraints
                .get(&t.grouping())
                .map_or(true, |c| c.allows(depth))
        })
        .map(|(t, w)| (*t, *w))
        .collect();
    normalized(table)
}

/// Rescale weights to sum to 1 (empty or all-zero tables are returned as-is)
pub fn normalized(table: WeightTable) -> WeightTable {
    let total: f64 = table.iter().map(|(_, w)| *w).sum();
    if total <= 0.0 {
        return table;
    }
    table.into_iter().map(|(t, w)| (t, w / total)).collect()
}

/// Cumulative-weight inversion. Ties resolve to the earlier entry.
pub fn draw_weighted(table: &[(EncounterType, f64)], rng: &mut dyn RandomSource) -> Option<EncounterType> {
    let total: f64 = table.iter().map(|(_, w)| *w).sum();
    if table.is_empty() || total <= 0.0 {
        return None;
    }
    let roll = rng.next_float() * total;
    let mut accumulated = 0.0;
    for (encounter, weight) in table {
        accumulated += weight;
        if accumulated >= roll {
            return Some(*encounter);
        }
    }
    table.last().map(|(t, _)| *t)
}

/// Pick `count` types for one level with no repeated type or grouping.
///
/// Already-placed candidates are removed before each draw rather than
/// retried. If that leaves nothing, the position draws from the level table
/// unconstrained, and from a uniform table over all types if even that is
/// empty.
pub fn select_level_types(
    table: &[(EncounterType, f64)],
    count: usize,
    rng: &mut dyn RandomSource,
) -> Vec<EncounterType> {
    let mut chosen: Vec<EncounterType> = Vec::with_capacity(count);

    for _ in 0..count {
        let remaining: WeightTable = normalized(
            table
                .iter()
                .filter(|(t, _)| {
                    !chosen
                        .iter()
                        .any(|c| *c == *t || c.grouping() == t.grouping())
                })
                .copied()
                .collect(),
        );

        let pick = draw_weighted(&remaining, rng)
            .or_else(|| draw_weighted(table, rng))
            .or_else(|| {
                let uniform: WeightTable =
                    EncounterType::ALL.iter().map(|t| (*t, 1.0)).collect();
                draw_weighted(&uniform, rng)
            });

        if let Some(encounter) = pick {
            chosen.push(encounter);
        }
    }

    chosen
}
