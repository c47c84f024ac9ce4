//! Dungeon map generation.
//!
//! One `generate_map` call runs four phases: generate every depth level,
//! connect consecutive levels, inject shortcuts, restamp return costs. The
//! generator keeps no state between calls; all randomness comes from the
//! caller's [`RandomSource`], so a seeded source reproduces a map exactly.

pub mod regions;
pub mod selection;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::balance::{BalanceError, BalanceManager, EncounterType};
use crate::constants::MIN_SHORTCUT_STEP_COST;
use crate::random::RandomSource;
use crate::returncost::ReturnCostCalculator;

pub use regions::{all_regions_unlocked, RegionUnlocks, StaticRegionUnlocks};
pub use selection::{candidate_weights, draw_weighted, select_level_types, WeightTable};
pub use validation::{get_map_statistics, validate_map, MapStatistics, MapValidation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Invalid depth: depth must be at least 1")]
    InvalidDepth { depth: i32 },
}

impl From<BalanceError> for GenerationError {
    fn from(e: BalanceError) -> Self {
        match e {
            BalanceError::InvalidDepth { depth } => Self::InvalidDepth { depth },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonNode {
    pub id: String,
    pub depth: i32,
    pub position: u32,
    #[serde(rename = "type")]
    pub encounter_type: EncounterType,
    pub energy_cost: u32,
    pub return_cost: u32,
    pub is_revealed: bool,
    /// Ids of nodes one level deeper
    pub connections: Vec<String>,
}

/// Permanent jump toward the surface placed by the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapShortcut {
    pub id: String,
    pub from_depth: i32,
    pub to_depth: i32,
    pub energy_reduction: f64,
    pub permanent: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MapParts")]
pub struct DungeonMap {
    pub nodes: Vec<DungeonNode>,
    pub shortcuts: Vec<MapShortcut>,
    pub max_depth: i32,
    pub region: Option<String>,
    /// Node id -> position in `nodes`
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Wire form of a map; the id index is rebuilt on load.
#[derive(Deserialize)]
struct MapParts {
    nodes: Vec<DungeonNode>,
    shortcuts: Vec<MapShortcut>,
    max_depth: i32,
    region: Option<String>,
}

impl From<MapParts> for DungeonMap {
    fn from(parts: MapParts) -> Self {
        Self::new(parts.nodes, parts.shortcuts, parts.max_depth, parts.region)
    }
}

impl DungeonMap {
    pub fn new(
        nodes: Vec<DungeonNode>,
        shortcuts: Vec<MapShortcut>,
        max_depth: i32,
        region: Option<String>,
    ) -> Self {
        let mut map = Self {
            nodes,
            shortcuts,
            max_depth,
            region,
            index: HashMap::new(),
        };
        map.rebuild_index();
        map
    }

    /// Re-index after adding, removing or reordering `nodes`.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.index
            .get(id)
            .copied()
            .filter(|&i| self.nodes.get(i).map_or(false, |n| n.id == id))
    }

    pub fn node(&self, id: &str) -> Option<&DungeonNode> {
        self.position_of(id).map(|i| &self.nodes[i])
    }

    /// Nodes of one level in position order
    pub fn nodes_at_depth(&self, depth: i32) -> Vec<&DungeonNode> {
        let mut level: Vec<&DungeonNode> = self.nodes.iter().filter(|n| n.depth == depth).collect();
        level.sort_by_key(|n| n.position);
        level
    }

    pub fn connected_nodes(&self, id: &str) -> Vec<&DungeonNode> {
        match self.node(id) {
            Some(node) => node
                .connections
                .iter()
                .filter_map(|target| self.node(target))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Mark a node revealed. Returns false for unknown ids and nodes that
    /// were already revealed.
    pub fn reveal_node(&mut self, id: &str) -> bool {
        match self.position_of(id) {
            Some(i) if !self.nodes[i].is_revealed => {
                self.nodes[i].is_revealed = true;
                true
            }
            _ => false,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> MapValidation {
        validate_map(&self.nodes)
    }

    pub fn statistics(&self) -> MapStatistics {
        get_map_statistics(&self.nodes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub min_nodes_per_level: i32,
    pub max_nodes_per_level: i32,
    /// Chance of one extra branch per node
    pub extra_edge_chance: f64,
    /// Chance of a shortcut starting at each depth >= 2
    pub shortcut_chance: f64,
    pub shortcut_reduction_min: f64,
    pub shortcut_reduction_max: f64,
    /// Node cost wobble, +/- this many energy
    pub cost_jitter: i32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_nodes_per_level: 2,
            max_nodes_per_level: 3,
            extra_edge_chance: 0.5,
            shortcut_chance: 0.075,
            shortcut_reduction_min: 10.0,
            shortcut_reduction_max: 30.0,
            cost_jitter: 1,
        }
    }
}

pub struct DungeonMapGenerator {
    balance: BalanceManager,
    return_costs: ReturnCostCalculator,
    config: GeneratorConfig,
    regions: Option<Box<dyn RegionUnlocks>>,
}

impl DungeonMapGenerator {
    pub fn new(balance: BalanceManager, return_costs: ReturnCostCalculator) -> Self {
        Self::with_config(balance, return_costs, GeneratorConfig::default())
    }

    pub fn with_config(
        balance: BalanceManager,
        return_costs: ReturnCostCalculator,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            balance,
            return_costs,
            config,
            regions: None,
        }
    }

    pub fn with_region_unlocks(mut self, regions: Box<dyn RegionUnlocks>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn balance(&self) -> &BalanceManager {
        &self.balance
    }

    pub fn balance_mut(&mut self) -> &mut BalanceManager {
        &mut self.balance
    }

    pub fn return_costs(&self) -> &ReturnCostCalculator {
        &self.return_costs
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// One region-unlock lookup per call
    fn exclude_discovery(&self) -> bool {
        match &self.regions {
            Some(unlocks) => all_regions_unlocked(
                unlocks.as_ref(),
                self.balance.get_config().region.regions.keys(),
            ),
            None => false,
        }
    }

    /// Generate the 2-3 nodes of one level, unconnected and unrevealed.
    pub fn generate_depth_level(
        &self,
        depth: i32,
        region: Option<&str>,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<DungeonNode>, GenerationError> {
        if depth < 1 {
            return Err(GenerationError::InvalidDepth { depth });
        }
        let exclude_discovery = self.exclude_discovery();
        self.build_level(depth, region, exclude_discovery, rng)
    }

    fn build_level(
        &self,
        depth: i32,
        region: Option<&str>,
        exclude_discovery: bool,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<DungeonNode>, GenerationError> {
        let cfg = self.balance.get_config();
        let table = candidate_weights(
            &self.balance.encounter_distribution(region),
            depth,
            &cfg.grouping.depth_constraints,
            exclude_discovery,
        );

        let count = rng
            .range_i32(self.config.min_nodes_per_level, self.config.max_nodes_per_level)
            .max(1) as usize;
        let types = select_level_types(&table, count, rng);

        let difficulty = self.balance.region_difficulty(region);
        let return_cost = self.return_costs.calculate_cumulative_return_cost(depth).round() as u32;
        let (min_cost, max_cost) = cfg.energy.cost_bounds();

        let mut nodes = Vec::with_capacity(types.len());
        for (position, encounter_type) in types.into_iter().enumerate() {
            let base = self.balance.calculate_node_cost(depth, encounter_type)? as f64;
            let jitter = rng.range_i32(-self.config.cost_jitter, self.config.cost_jitter) as f64;
            let cost = (base * difficulty + jitter)
                .clamp(min_cost, max_cost)
                .max(1.0)
                .round() as u32;

            nodes.push(DungeonNode {
                id: format!("depth{depth}-node{position}"),
                depth,
                position: position as u32,
                encounter_type,
                energy_cost: cost,
                return_cost,
                is_revealed: false,
                connections: Vec::new(),
            });
        }

        debug!(depth, nodes = nodes.len(), ?region, "generated depth level");
        Ok(nodes)
    }

    /// Generate a full connected map for depths `1..=max_depth`.
    pub fn generate_map(
        &self,
        max_depth: i32,
        region: Option<&str>,
        rng: &mut dyn RandomSource,
    ) -> Result<DungeonMap, GenerationError> {
        if max_depth < 1 {
            return Err(GenerationError::InvalidDepth { depth: max_depth });
        }
        let exclude_discovery = self.exclude_discovery();

        let mut levels: Vec<Vec<DungeonNode>> = Vec::with_capacity(max_depth as usize);
        for depth in 1..=max_depth {
            levels.push(self.build_level(depth, region, exclude_discovery, rng)?);
        }

        self.connect_levels(&mut levels, rng);
        let shortcuts = self.inject_shortcuts(max_depth, rng);

        let return_costs = self.shortcut_return_costs(max_depth, &shortcuts);
        let mut nodes: Vec<DungeonNode> = levels.into_iter().flatten().collect();
        for node in &mut nodes {
            node.return_cost = return_costs[node.depth as usize];
            node.is_revealed = node.depth == 1;
        }

        info!(
            max_depth,
            nodes = nodes.len(),
            shortcuts = shortcuts.len(),
            ?region,
            "dungeon map generated"
        );

        Ok(DungeonMap::new(
            nodes,
            shortcuts,
            max_depth,
            region.map(str::to_string),
        ))
    }

    /// Every deeper node gets one incoming edge, then each shallower node may
    /// branch once more to a node it does not reach yet.
    fn connect_levels(&self, levels: &mut [Vec<DungeonNode>], rng: &mut dyn RandomSource) {
        for d in 0..levels.len().saturating_sub(1) {
            let upper_len = levels[d].len();
            let lower_len = levels[d + 1].len();
            if upper_len == 0 || lower_len == 0 {
                continue;
            }

            let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); upper_len];
            for lower in 0..lower_len {
                let parent = rng.pick_index(upper_len);
                adjacency[parent].push(lower);
            }

            for edges in adjacency.iter_mut() {
                if !rng.chance(self.config.extra_edge_chance) {
                    continue;
                }
                let open: Vec<usize> = (0..lower_len).filter(|i| !edges.contains(i)).collect();
                if open.is_empty() {
                    continue;
                }
                edges.push(open[rng.pick_index(open.len())]);
            }

            let (upper, lower) = levels.split_at_mut(d + 1);
            for (node, edges) in upper[d].iter_mut().zip(adjacency) {
                node.connections = edges.into_iter().map(|i| lower[0][i].id.clone()).collect();
            }
        }
    }

    fn inject_shortcuts(&self, max_depth: i32, rng: &mut dyn RandomSource) -> Vec<MapShortcut> {
        let mut shortcuts = Vec::new();
        for from_depth in 2..=max_depth {
            if !rng.chance(self.config.shortcut_chance) {
                continue;
            }
            let to_depth = rng.range_i32(1, from_depth - 1);
            let energy_reduction = rng
                .range_f64(self.config.shortcut_reduction_min, self.config.shortcut_reduction_max)
                .round();
            shortcuts.push(MapShortcut {
                id: format!("shortcut-depth{from_depth}-to-depth{to_depth}"),
                from_depth,
                to_depth,
                energy_reduction,
                permanent: true,
                description: format!(
                    "Passage from depth {from_depth} up to depth {to_depth}"
                ),
            });
        }
        shortcuts
    }

    /// Return cost per depth (index = depth, index 0 = surface) walking up
    /// and taking the shortcut that starts at a depth when there is one.
    fn shortcut_return_costs(&self, max_depth: i32, shortcuts: &[MapShortcut]) -> Vec<u32> {
        let mut jumps: HashMap<i32, &MapShortcut> = HashMap::new();
        for shortcut in shortcuts {
            jumps.entry(shortcut.from_depth).or_insert(shortcut);
        }

        let mut walk = vec![0.0f64; max_depth as usize + 1];
        for depth in 1..=max_depth {
            let base = self.return_costs.calculate_base_return_cost(depth);
            walk[depth as usize] = match jumps.get(&depth) {
                Some(jump) => {
                    (base - jump.energy_reduction).max(MIN_SHORTCUT_STEP_COST)
                        + walk[jump.to_depth.clamp(0, depth - 1) as usize]
                }
                None => base + walk[depth as usize - 1],
            };
        }
        walk.into_iter().map(|c| c.round() as u32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{EncounterGrouping, Preset};
    use crate::random::seeded;
    use std::collections::HashSet;

    fn generator() -> DungeonMapGenerator {
        DungeonMapGenerator::new(BalanceManager::default(), ReturnCostCalculator::default())
    }

    #[test]
    fn test_depth_level_shape() {
        let generator = generator();
        let mut rng = seeded(11);
        for depth in 1..=20 {
            let nodes = generator.generate_depth_level(depth, None, &mut rng).unwrap();
            assert!((2..=3).contains(&nodes.len()));
            let mut types = HashSet::new();
            let mut groupings = HashSet::new();
            for (pos, node) in nodes.iter().enumerate() {
                assert_eq!(node.depth, depth);
                assert_eq!(node.id, format!("depth{depth}-node{pos}"));
                assert!(!node.is_revealed);
                assert!(node.connections.is_empty());
                assert!(types.insert(node.encounter_type));
                assert!(groupings.insert(node.encounter_type.grouping()));
            }
        }
    }

    #[test]
    fn test_depth_level_rejects_surface() {
        let generator = generator();
        let mut rng = seeded(1);
        assert_eq!(
            generator.generate_depth_level(0, None, &mut rng),
            Err(GenerationError::InvalidDepth { depth: 0 })
        );
        assert!(generator.generate_map(0, None, &mut rng).is_err());
    }

    #[test]
    fn test_level_return_cost_is_rounded_cumulative() {
        let generator = generator();
        let mut rng = seeded(3);
        let nodes = generator.generate_depth_level(3, None, &mut rng).unwrap();
        let expected = generator.return_costs().calculate_cumulative_return_cost(3).round() as u32;
        assert!(nodes.iter().all(|n| n.return_cost == expected));
    }

    #[test]
    fn test_costs_stay_in_bounds() {
        let generator = generator();
        let mut rng = seeded(8);
        let map = generator.generate_map(20, Some("shadow_realm"), &mut rng).unwrap();
        for node in &map.nodes {
            assert!((5..=50).contains(&node.energy_cost), "{}", node.energy_cost);
        }
    }

    #[test]
    fn test_testing_preset_costs_are_flat() {
        let generator = DungeonMapGenerator::with_config(
            BalanceManager::with_preset(Preset::Testing),
            ReturnCostCalculator::default(),
            GeneratorConfig {
                cost_jitter: 0,
                ..Default::default()
            },
        );
        let mut rng = seeded(4);
        let map = generator.generate_map(6, None, &mut rng).unwrap();
        assert!(map.nodes.iter().all(|n| n.energy_cost == 1));
    }

    #[test]
    fn test_recovery_gated_until_depth_eleven() {
        let generator = generator();
        let mut rng = seeded(99);
        let mut deep_recovery = false;
        for _ in 0..30 {
            let map = generator.generate_map(20, None, &mut rng).unwrap();
            for node in &map.nodes {
                let recovery = node.encounter_type.grouping() == EncounterGrouping::RecoveryAndNavigation;
                if node.depth <= 10 {
                    assert!(!recovery, "{} at depth {}", node.encounter_type, node.depth);
                } else if recovery {
                    deep_recovery = true;
                }
            }
        }
        assert!(deep_recovery);
    }

    #[test]
    fn test_map_is_connected_and_valid() {
        let generator = generator();
        for seed in 0..25 {
            let mut rng = seeded(seed);
            let map = generator.generate_map(12, None, &mut rng).unwrap();
            let validation = map.validate();
            assert!(validation.is_valid, "seed {seed}: {:?}", validation.errors);
            assert!(map
                .nodes
                .iter()
                .all(|n| n.is_revealed == (n.depth == 1)));
            assert!(map.nodes_at_depth(12).iter().all(|n| n.connections.is_empty()));
        }
    }

    #[test]
    fn test_same_seed_same_map() {
        let generator = generator();
        let a = generator.generate_map(10, Some("fungal_depths"), &mut seeded(5)).unwrap();
        let b = generator.generate_map(10, Some("fungal_depths"), &mut seeded(5)).unwrap();
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn test_same_depth_shares_return_cost() {
        let generator = DungeonMapGenerator::with_config(
            BalanceManager::default(),
            ReturnCostCalculator::default(),
            GeneratorConfig {
                shortcut_chance: 1.0,
                ..Default::default()
            },
        );
        let map = generator.generate_map(8, None, &mut seeded(21)).unwrap();
        assert_eq!(map.shortcuts.len(), 7);
        for depth in 1..=8 {
            let level = map.nodes_at_depth(depth);
            assert!(level.iter().all(|n| n.return_cost == level[0].return_cost));
        }
        for shortcut in &map.shortcuts {
            assert!(shortcut.to_depth >= 1 && shortcut.to_depth < shortcut.from_depth);
            assert!((10.0..=30.0).contains(&shortcut.energy_reduction));
            assert!(shortcut.permanent);
        }
    }

    #[test]
    fn test_shortcut_walk_cost() {
        let generator = generator();
        let shortcuts = vec![MapShortcut {
            id: "s".to_string(),
            from_depth: 3,
            to_depth: 1,
            energy_reduction: 20.0,
            permanent: true,
            description: "test".to_string(),
        }];
        let costs = generator.shortcut_return_costs(4, &shortcuts);
        let calc = generator.return_costs();
        let base = |d| calc.calculate_base_return_cost(d);
        // depth 3 jumps to depth 1, so depth 2 is never paid
        let d3 = (base(3) - 20.0).max(1.0) + base(1);
        assert_eq!(costs[0], 0);
        assert_eq!(costs[1], base(1).round() as u32);
        assert_eq!(costs[2], (base(1) + base(2)).round() as u32);
        assert_eq!(costs[3], d3.round() as u32);
        assert_eq!(costs[4], (base(4) + d3).round() as u32);
    }

    #[test]
    fn test_discounted_step_floors_at_one() {
        let generator = generator();
        let shortcuts = vec![MapShortcut {
            id: "s".to_string(),
            from_depth: 2,
            to_depth: 1,
            energy_reduction: 500.0,
            permanent: true,
            description: "test".to_string(),
        }];
        let costs = generator.shortcut_return_costs(2, &shortcuts);
        assert_eq!(costs[2], 6);
    }

    #[test]
    fn test_discovery_excluded_when_everything_unlocked() {
        let all = BalanceManager::default()
            .get_config()
            .region
            .regions
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        let generator = generator().with_region_unlocks(Box::new(StaticRegionUnlocks::new(all)));
        let mut rng = seeded(12);
        for _ in 0..40 {
            let map = generator.generate_map(10, None, &mut rng).unwrap();
            assert!(map
                .nodes
                .iter()
                .all(|n| n.encounter_type != EncounterType::DiscoverySite));
        }
    }

    #[test]
    fn test_map_accessors() {
        let generator = generator();
        let mut map = generator.generate_map(3, None, &mut seeded(2)).unwrap();
        let first = map.nodes_at_depth(1)[0].id.clone();
        assert!(!map.connected_nodes(&first).iter().any(|n| n.depth != 2));
        assert!(map.connected_nodes("nope").is_empty());

        let deep = map.nodes_at_depth(3)[0].id.clone();
        assert!(map.reveal_node(&deep));
        assert!(!map.reveal_node(&deep));
        assert!(!map.reveal_node("nope"));
        assert!(map.node(&deep).map_or(false, |n| n.is_revealed));

        let json = map.to_json().unwrap();
        assert!(json.contains("\"type\""));
        assert!(json.contains("\"energyCost\""));
        assert!(json.contains("\"isRevealed\""));
    }

    #[test]
    fn test_lookups_survive_json_reload() {
        let generator = generator();
        let map = generator.generate_map(6, None, &mut seeded(17)).unwrap();
        let restored: DungeonMap = serde_json::from_str(&map.to_json().unwrap()).unwrap();
        assert_eq!(restored, map);
        for node in &map.nodes {
            assert_eq!(restored.node(&node.id), Some(node));
            assert_eq!(
                restored.connected_nodes(&node.id).len(),
                node.connections.len()
            );
        }
    }

    #[test]
    fn test_reordered_nodes_need_reindex() {
        let generator = generator();
        let mut map = generator.generate_map(4, None, &mut seeded(3)).unwrap();
        let last = map.nodes.last().map(|n| n.id.clone()).unwrap();
        map.nodes.reverse();
        assert!(map.node(&last).is_none());
        map.rebuild_index();
        assert_eq!(map.node(&last).map(|n| n.id.as_str()), Some(last.as_str()));
        assert!(map.node("depth9-node0").is_none());
    }

    /// Every deeper node has one guaranteed parent, so edges beyond the
    /// deeper level's size are extras: at most one per shallower node.
    fn assert_branching(extra_edge_chance: f64) {
        let generator = DungeonMapGenerator::with_config(
            BalanceManager::default(),
            ReturnCostCalculator::default(),
            GeneratorConfig {
                extra_edge_chance,
                ..Default::default()
            },
        );
        for seed in 0..40 {
            let map = generator.generate_map(10, None, &mut seeded(seed)).unwrap();
            for depth in 1..10 {
                let upper = map.nodes_at_depth(depth);
                let lower = map.nodes_at_depth(depth + 1);
                let mut edges = 0;
                for node in &upper {
                    let unique: HashSet<&String> = node.connections.iter().collect();
                    assert_eq!(unique.len(), node.connections.len(), "duplicate edge on {}", node.id);
                    assert!(node
                        .connections
                        .iter()
                        .all(|id| map.node(id).map_or(false, |c| c.depth == depth + 1)));
                    edges += node.connections.len();
                }
                for child in &lower {
                    assert!(upper.iter().any(|n| n.connections.contains(&child.id)));
                }

                let extras = edges - lower.len();
                assert!(extras <= upper.len(), "seed {seed} depth {depth}: {extras} extras");
                if extra_edge_chance == 0.0 {
                    assert_eq!(extras, 0, "seed {seed} depth {depth}");
                }
                if extra_edge_chance == 1.0 {
                    // a node left without a guaranteed child always branches once
                    assert!(upper.iter().all(|n| !n.connections.is_empty()));
                }
            }
        }
    }

    #[test]
    fn test_branching_without_extra_edges() {
        assert_branching(0.0);
    }

    #[test]
    fn test_branching_with_default_extra_edges() {
        assert_branching(0.5);
    }

    #[test]
    fn test_branching_with_extra_edge_every_time() {
        assert_branching(1.0);
    }
}
