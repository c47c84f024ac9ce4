//! Economy formulas.
//!
//! [`BalanceManager`] owns one [`GameBalanceConfig`] snapshot and exposes the
//! cost/reward/difficulty math every encounter and the map generator use.
//! The snapshot is replace-only: updates, presets and imports swap it whole.

pub mod config;
pub mod encounter;
pub mod simulation;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{MIN_REWARD_VALUE, STARTING_ENERGY_BUFFER};
use crate::random::RandomSource;

pub use config::{validate_grouping_distribution, ConfigError, GameBalanceConfig, Preset};
pub use encounter::{DepthConstraint, EncounterGrouping, EncounterReward, EncounterType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("Invalid depth: depth must be at least 1")]
    InvalidDepth { depth: i32 },
}

/// Coarse margin classification used by quick projections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyMarginLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BustRateCheck {
    pub bust_rate: f64,
    pub balanced: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BalanceManager {
    config: GameBalanceConfig,
}

impl BalanceManager {
    pub fn new(config: GameBalanceConfig) -> Self {
        if !validate_grouping_distribution(&config.grouping.distribution) {
            warn!("grouping distribution does not sum to 1.0");
        }
        Self { config }
    }

    pub fn with_preset(preset: Preset) -> Self {
        Self::new(preset.config())
    }

    pub fn get_config(&self) -> &GameBalanceConfig {
        &self.config
    }

    /// Merge a JSON patch section by section. On error the current snapshot
    /// is kept.
    pub fn update_config(&mut self, patch: &Value) -> Result<(), ConfigError> {
        let next = self.config.merged(patch)?;
        if !validate_grouping_distribution(&next.grouping.distribution) {
            warn!("updated grouping distribution does not sum to 1.0");
        }
        self.config = next;
        debug!("balance config updated");
        Ok(())
    }

    pub fn load_preset(&mut self, preset: Preset) {
        self.config = preset.config();
        info!(preset = preset.as_str(), "balance preset loaded");
    }

    pub fn export_config(&self) -> GameBalanceConfig {
        self.config.clone()
    }

    pub fn import_config(&mut self, config: GameBalanceConfig) {
        if !validate_grouping_distribution(&config.grouping.distribution) {
            warn!("imported grouping distribution does not sum to 1.0");
        }
        self.config = config;
    }

    // ---------------------------------------------------------------
    // Energy
    // ---------------------------------------------------------------

    /// Energy to enter a node of `encounter` at `depth`
    pub fn calculate_node_cost(
        &self,
        depth: i32,
        encounter: EncounterType,
    ) -> Result<u32, BalanceError> {
        if depth < 1 {
            return Err(BalanceError::InvalidDepth { depth });
        }
        let energy = &self.config.energy;
        let modifier = energy.type_modifiers.get(&encounter).copied().unwrap_or(0.0);
        let raw = energy.base_cost + (depth - 1) as f64 * energy.depth_multiplier + modifier;
        let (min, max) = energy.cost_bounds();
        Ok(raw.clamp(min, max).round() as u32)
    }

    /// Single-term return projection: `round(base * depth^exp)`
    pub fn calculate_return_cost(&self, depth: i32) -> u32 {
        if depth <= 0 {
            return 0;
        }
        let rc = &self.config.return_cost;
        (rc.base_multiplier * (depth as f64).powf(rc.exponent)).round() as u32
    }

    /// Sum of the single-term projection over depths 1..=depth
    pub fn calculate_cumulative_return_cost(&self, depth: i32) -> u32 {
        (1..=depth.max(0)).map(|d| self.calculate_return_cost(d)).sum()
    }

    // ---------------------------------------------------------------
    // Rewards & difficulty
    // ---------------------------------------------------------------

    pub fn calculate_depth_reward_scaling(&self, depth: i32) -> f64 {
        1.0 + depth.max(0) as f64 * self.config.reward.depth_scaling_factor
    }

    /// Scaled reward with symmetric random variance; never below 1.
    pub fn calculate_reward_value(
        &self,
        base_value: f64,
        encounter: EncounterType,
        depth: i32,
        rng: &mut dyn RandomSource,
    ) -> u32 {
        let reward = &self.config.reward;
        let multiplier = reward.type_multipliers.get(&encounter).copied().unwrap_or(1.0);
        let raw = base_value * multiplier * self.calculate_depth_reward_scaling(depth);

        let range = reward.variation_base + depth as f64 * reward.variation_depth_multiplier;
        let variation = rng.range_f64(-range, range);
        (raw * (1.0 + variation)).max(MIN_REWARD_VALUE).round() as u32
    }

    pub fn calculate_difficulty_multiplier(&self, depth: i32) -> f64 {
        let d = &self.config.difficulty;
        d.base_multiplier + depth as f64 * d.depth_multiplier
    }

    /// Difficulty multiplier of a region, 1.0 when none or unknown
    pub fn region_difficulty(&self, region: Option<&str>) -> f64 {
        region
            .and_then(|r| self.config.region_profile(r))
            .map(|p| p.difficulty_multiplier)
            .unwrap_or(1.0)
    }

    // ---------------------------------------------------------------
    // Safety & projections
    // ---------------------------------------------------------------

    pub fn assess_safety_margin(&self, current_energy: f64, return_cost: f64) -> SafetyMarginLevel {
        let margin = current_energy - return_cost;
        let energy = &self.config.energy;
        if margin < energy.safety_margin_low {
            SafetyMarginLevel::Low
        } else if margin < energy.safety_margin_high {
            SafetyMarginLevel::Medium
        } else {
            SafetyMarginLevel::High
        }
    }

    /// Encounter weights for a region (or the global table), zero weights dropped
    pub fn encounter_distribution(&self, region: Option<&str>) -> BTreeMap<EncounterType, f64> {
        let table = match region {
            Some(name) => match self.config.region_profile(name) {
                Some(profile) => &profile.distribution,
                None => {
                    warn!(region = name, "unknown region, using default distribution");
                    &self.config.encounter.distribution
                }
            },
            None => &self.config.encounter.distribution,
        };
        table
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(t, w)| (*t, *w))
            .collect()
    }

    /// Normalized probability of an encounter in the global distribution
    pub fn encounter_probability(&self, encounter: EncounterType) -> f64 {
        let total = self.distribution_total();
        if total <= 0.0 {
            return 0.0;
        }
        self.positive_weight(encounter) / total
    }

    fn distribution_total(&self) -> f64 {
        self.config
            .encounter
            .distribution
            .values()
            .filter(|w| **w > 0.0)
            .sum()
    }

    fn positive_weight(&self, encounter: EncounterType) -> f64 {
        self.config
            .encounter
            .distribution
            .get(&encounter)
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(0.0)
    }

    /// Expected energy spent entering one node per depth down to `max_depth`
    pub fn calculate_expected_energy_cost(&self, max_depth: i32) -> u32 {
        let total_weight = self.distribution_total();
        if total_weight <= 0.0 {
            return 0;
        }
        let probabilities: Vec<(EncounterType, f64)> = EncounterType::ALL
            .into_iter()
            .map(|t| (t, self.positive_weight(t) / total_weight))
            .filter(|(_, p)| *p > 0.0)
            .collect();

        let mut total = 0.0;
        for depth in 1..=max_depth.max(0) {
            for &(encounter, p) in &probabilities {
                // depth >= 1 inside this loop
                let cost = self.calculate_node_cost(depth, encounter).unwrap_or(0);
                total += p * cost as f64;
            }
        }
        total.round() as u32
    }

    pub fn get_recommended_starting_energy(&self, depth: i32) -> u32 {
        self.calculate_expected_energy_cost(depth)
            + self.calculate_return_cost(depth)
            + STARTING_ENERGY_BUFFER
    }

    pub fn is_bust_rate_balanced(&self, total_runs: u32, bust_runs: u32) -> BustRateCheck {
        if total_runs == 0 {
            return BustRateCheck {
                bust_rate: 0.0,
                balanced: false,
            };
        }
        let bust_rate = bust_runs as f64 / total_runs as f64;
        let d = &self.config.difficulty;
        BustRateCheck {
            bust_rate,
            balanced: bust_rate >= d.target_bust_rate_min && bust_rate <= d.target_bust_rate_max,
        }
    }

    // ---------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------

    pub fn calculate_collection_bonus_energy(&self, set_count: u32) -> u32 {
        self.config.collection.set_completion_bonus_energy * set_count
    }

    pub fn calculate_collection_bonus_items(&self, set_count: u32) -> u32 {
        self.config.collection.set_completion_bonus_items * set_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::seeded;
    use serde_json::json;

    fn manager() -> BalanceManager {
        BalanceManager::default()
    }

    #[test]
    fn test_node_cost_rejects_surface() {
        let m = manager();
        assert_eq!(
            m.calculate_node_cost(0, EncounterType::Hazard),
            Err(BalanceError::InvalidDepth { depth: 0 })
        );
        let err = m.calculate_node_cost(-3, EncounterType::Hazard).unwrap_err();
        assert_eq!(err.to_string(), "Invalid depth: depth must be at least 1");
    }

    #[test]
    fn test_node_cost_type_offsets_are_exact() {
        let m = manager();
        let puzzle = m.calculate_node_cost(2, EncounterType::PuzzleChamber).unwrap();
        let trade = m.calculate_node_cost(2, EncounterType::TradeOpportunity).unwrap();
        let hazard = m.calculate_node_cost(2, EncounterType::Hazard).unwrap();
        assert_eq!(puzzle, 12);
        assert_eq!(trade, puzzle - 2);
        assert_eq!(hazard, puzzle + 3);
    }

    #[test]
    fn test_node_cost_is_clamped() {
        let m = manager();
        let cfg = m.get_config();
        for depth in 1..=100 {
            for t in EncounterType::ALL {
                let cost = m.calculate_node_cost(depth, t).unwrap() as f64;
                assert!(cost >= cfg.energy.min_cost && cost <= cfg.energy.max_cost);
            }
        }
        assert_eq!(m.calculate_node_cost(100, EncounterType::Scoundrel).unwrap(), 50);
    }

    #[test]
    fn test_return_cost_single_term() {
        let m = manager();
        assert_eq!(m.calculate_return_cost(0), 0);
        assert_eq!(m.calculate_return_cost(1), 5);
        assert_eq!(m.calculate_return_cost(2), 20);
        assert_eq!(m.calculate_return_cost(3), 45);
    }

    #[test]
    fn test_cumulative_return_cost() {
        let m = manager();
        assert_eq!(m.calculate_cumulative_return_cost(1), 5);
        assert_eq!(m.calculate_cumulative_return_cost(2), 25);
        assert_eq!(m.calculate_cumulative_return_cost(3), 70);
        assert_eq!(m.calculate_cumulative_return_cost(-1), 0);
    }

    #[test]
    fn test_reward_scaling_and_difficulty_are_linear() {
        let m = manager();
        assert!((m.calculate_depth_reward_scaling(0) - 1.0).abs() < 1e-9);
        assert!((m.calculate_depth_reward_scaling(5) - 1.5).abs() < 1e-9);
        assert!((m.calculate_depth_reward_scaling(-4) - 1.0).abs() < 1e-9);
        let d1 = m.calculate_difficulty_multiplier(1);
        let d2 = m.calculate_difficulty_multiplier(2);
        let d3 = m.calculate_difficulty_multiplier(3);
        assert!(((d3 - d2) - (d2 - d1)).abs() < 1e-9);
        assert!((m.calculate_difficulty_multiplier(10) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_reward_value_within_variance_band() {
        let m = manager();
        let mut rng = seeded(5);
        // 10 * 1.2 * 1.3 = 15.6, range 0.13
        for _ in 0..500 {
            let v = m.calculate_reward_value(10.0, EncounterType::PuzzleChamber, 3, &mut rng);
            assert!((13..=18).contains(&v), "reward {v} outside band");
        }
    }

    #[test]
    fn test_reward_value_floor() {
        let m = manager();
        let mut rng = seeded(5);
        assert_eq!(
            m.calculate_reward_value(0.0, EncounterType::RestSite, 1, &mut rng),
            1
        );
    }

    #[test]
    fn test_reward_without_variance_is_exact() {
        let m = BalanceManager::with_preset(Preset::Testing);
        let mut rng = seeded(77);
        assert_eq!(
            m.calculate_reward_value(42.0, EncounterType::Scoundrel, 9, &mut rng),
            42
        );
    }

    #[test]
    fn test_safety_margin_levels() {
        let m = manager();
        assert_eq!(m.assess_safety_margin(100.0, 90.0), SafetyMarginLevel::Low);
        assert_eq!(m.assess_safety_margin(100.0, 80.0), SafetyMarginLevel::Medium);
        assert_eq!(m.assess_safety_margin(100.0, 10.0), SafetyMarginLevel::Medium);
        assert_eq!(m.assess_safety_margin(200.0, 100.0), SafetyMarginLevel::High);
    }

    #[test]
    fn test_expected_cost_and_recommendation() {
        let m = manager();
        let one = m.calculate_expected_energy_cost(1);
        let three = m.calculate_expected_energy_cost(3);
        assert!(one > 0);
        assert!(three > one);
        assert_eq!(m.calculate_expected_energy_cost(0), 0);
        assert_eq!(
            m.get_recommended_starting_energy(3),
            three + m.calculate_return_cost(3) + 50
        );
    }

    #[test]
    fn test_expected_cost_testing_preset() {
        let m = BalanceManager::with_preset(Preset::Testing);
        // every node costs exactly 1
        assert_eq!(m.calculate_expected_energy_cost(7), 7);
    }

    #[test]
    fn test_expected_cost_matches_per_type_probabilities() {
        let mut m = manager();
        m.update_config(&serde_json::json!({
            "encounter": { "distribution": { "hazard": 3.0, "rest_site": 1.0, "scoundrel": 0.0 } }
        }))
        .unwrap();
        assert_eq!(m.encounter_probability(EncounterType::Hazard), 0.75);
        assert_eq!(m.encounter_probability(EncounterType::Scoundrel), 0.0);

        let mut by_hand = 0.0;
        for depth in 1..=6 {
            for encounter in EncounterType::ALL {
                let cost = m.calculate_node_cost(depth, encounter).unwrap() as f64;
                by_hand += m.encounter_probability(encounter) * cost;
            }
        }
        assert_eq!(m.calculate_expected_energy_cost(6), by_hand.round() as u32);
    }

    #[test]
    fn test_empty_distribution_expects_nothing() {
        let mut m = manager();
        m.update_config(&serde_json::json!({ "encounter": { "distribution": {} } }))
            .unwrap();
        assert_eq!(m.encounter_probability(EncounterType::Hazard), 0.0);
        assert_eq!(m.calculate_expected_energy_cost(10), 0);
    }

    #[test]
    fn test_bust_rate_balance() {
        let m = manager();
        let check = m.is_bust_rate_balanced(100, 25);
        assert!((check.bust_rate - 0.25).abs() < 1e-12);
        assert!(check.balanced);
        assert!(!m.is_bust_rate_balanced(100, 10).balanced);
        assert!(!m.is_bust_rate_balanced(100, 40).balanced);
        assert!(m.is_bust_rate_balanced(100, 20).balanced);
        assert!(m.is_bust_rate_balanced(100, 30).balanced);
        assert!(!m.is_bust_rate_balanced(0, 0).balanced);
    }

    #[test]
    fn test_collection_bonus_linear() {
        let m = manager();
        assert_eq!(m.calculate_collection_bonus_energy(1), 50);
        assert_eq!(m.calculate_collection_bonus_energy(2), 100);
        assert_eq!(m.calculate_collection_bonus_energy(0), 0);
        assert_eq!(m.calculate_collection_bonus_items(3), 6);
    }

    #[test]
    fn test_update_config_is_per_section() {
        let mut m = manager();
        let before = m.export_config();
        m.update_config(&json!({ "energy": { "base_cost": 15.0 } }))
            .unwrap();
        assert_eq!(m.get_config().energy.base_cost, 15.0);
        assert_eq!(m.get_config().reward, before.reward);
        assert_eq!(m.calculate_node_cost(1, EncounterType::PuzzleChamber).unwrap(), 15);
    }

    #[test]
    fn test_failed_update_keeps_snapshot() {
        let mut m = manager();
        let before = m.export_config();
        assert!(m.update_config(&json!({ "energy": { "nope": 1 } })).is_err());
        assert_eq!(m.get_config(), &before);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut source = manager();
        source.load_preset(Preset::Hard);
        let mut target = manager();
        target.import_config(source.export_config());
        assert_eq!(target.get_config(), source.get_config());
    }

    #[test]
    fn test_region_distribution_and_difficulty() {
        let m = manager();
        let ruins = m.encounter_distribution(Some("ancient_ruins"));
        assert!(!ruins.contains_key(&EncounterType::Hazard));
        assert!(ruins.contains_key(&EncounterType::Scoundrel));
        assert_eq!(
            m.encounter_distribution(Some("atlantis")),
            m.encounter_distribution(None)
        );
        assert!((m.region_difficulty(Some("shadow_realm")) - 1.4).abs() < 1e-9);
        assert!((m.region_difficulty(None) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_encounter_probabilities_sum_to_one() {
        let m = manager();
        let total: f64 = EncounterType::ALL
            .iter()
            .map(|t| m.encounter_probability(*t))
            .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
