//! Balance configuration snapshots.
//!
//! A [`GameBalanceConfig`] is an immutable value: managers replace it, they
//! never edit it in place. Partial updates arrive as JSON patches and are
//! merged section by section; presets are complete alternate snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::encounter::{DepthConstraint, EncounterGrouping, EncounterType};
use crate::constants::{FALLBACK_MAX_NODE_COST, FALLBACK_MIN_NODE_COST, GROUPING_SUM_TOLERANCE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid config patch: {0}")]
    InvalidPatch(String),
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySettings {
    pub base_cost: f64,
    pub depth_multiplier: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    /// Flat offset added to the node cost per encounter type
    pub type_modifiers: BTreeMap<EncounterType, f64>,
    pub safety_margin_low: f64,
    pub safety_margin_medium: f64,
    pub safety_margin_high: f64,
}

impl EnergySettings {
    /// `(min, max)` node cost bounds, safe to pass to `f64::clamp`.
    /// NaN or infinite bounds fall back to the stock ones.
    pub fn cost_bounds(&self) -> (f64, f64) {
        let min = if self.min_cost.is_finite() {
            self.min_cost
        } else {
            FALLBACK_MIN_NODE_COST
        };
        let max = if self.max_cost.is_finite() {
            self.max_cost
        } else {
            FALLBACK_MAX_NODE_COST
        };
        (min, max.max(min))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardSettings {
    pub depth_scaling_factor: f64,
    pub variation_base: f64,
    pub variation_depth_multiplier: f64,
    pub type_multipliers: BTreeMap<EncounterType, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultySettings {
    pub base_multiplier: f64,
    pub depth_multiplier: f64,
    pub target_bust_rate_min: f64,
    pub target_bust_rate_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub set_completion_bonus_energy: u32,
    pub set_completion_bonus_items: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterSettings {
    /// Global encounter weights; normalized at sampling time
    pub distribution: BTreeMap<EncounterType, f64>,
}

/// A themed region with its own encounter mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionProfile {
    pub name: String,
    pub difficulty_multiplier: f64,
    pub distribution: BTreeMap<EncounterType, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSettings {
    pub regions: BTreeMap<String, RegionProfile>,
}

/// Single-term return-cost projection used by quick estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnCostSettings {
    pub base_multiplier: f64,
    pub exponent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingSettings {
    pub distribution: BTreeMap<EncounterGrouping, f64>,
    pub depth_constraints: BTreeMap<EncounterGrouping, DepthConstraint>,
}

/// Complete balance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameBalanceConfig {
    pub energy: EnergySettings,
    pub reward: RewardSettings,
    pub difficulty: DifficultySettings,
    pub collection: CollectionSettings,
    pub encounter: EncounterSettings,
    pub region: RegionSettings,
    pub return_cost: ReturnCostSettings,
    pub grouping: GroupingSettings,
}

fn type_table(entries: &[(EncounterType, f64)]) -> BTreeMap<EncounterType, f64> {
    entries.iter().copied().collect()
}

fn default_type_modifiers() -> BTreeMap<EncounterType, f64> {
    use EncounterType::*;
    type_table(&[
        (PuzzleChamber, 0.0),
        (TradeOpportunity, -2.0),
        (DiscoverySite, 1.0),
        (RiskEvent, 2.0),
        (Hazard, 3.0),
        (Scoundrel, 4.0),
        (RestSite, -3.0),
        (SafePassage, -2.0),
        (RegionShortcut, -1.0),
        (LuckShrine, 0.0),
        (EnergyNexus, -1.0),
        (FateWeaver, 1.0),
    ])
}

fn default_reward_multipliers() -> BTreeMap<EncounterType, f64> {
    use EncounterType::*;
    type_table(&[
        (PuzzleChamber, 1.2),
        (TradeOpportunity, 1.0),
        (DiscoverySite, 1.5),
        (RiskEvent, 1.8),
        (Hazard, 1.4),
        (Scoundrel, 2.0),
        (RestSite, 0.8),
        (SafePassage, 0.8),
        (RegionShortcut, 0.9),
        (LuckShrine, 1.1),
        (EnergyNexus, 0.9),
        (FateWeaver, 1.3),
    ])
}

fn default_distribution() -> BTreeMap<EncounterType, f64> {
    use EncounterType::*;
    type_table(&[
        (PuzzleChamber, 0.15),
        (TradeOpportunity, 0.08),
        (DiscoverySite, 0.10),
        (RiskEvent, 0.12),
        (Hazard, 0.10),
        (Scoundrel, 0.08),
        (RestSite, 0.08),
        (SafePassage, 0.05),
        (RegionShortcut, 0.04),
        (LuckShrine, 0.07),
        (EnergyNexus, 0.07),
        (FateWeaver, 0.06),
    ])
}

fn default_regions() -> BTreeMap<String, RegionProfile> {
    use EncounterType::*;
    let profiles = [
        RegionProfile {
            name: "crystal_caverns".into(),
            difficulty_multiplier: 1.0,
            distribution: type_table(&[
                (PuzzleChamber, 0.25),
                (DiscoverySite, 0.15),
                (TradeOpportunity, 0.10),
                (RiskEvent, 0.10),
                (Hazard, 0.05),
                (RestSite, 0.10),
                (SafePassage, 0.05),
                (LuckShrine, 0.10),
                (EnergyNexus, 0.10),
            ]),
        },
        RegionProfile {
            name: "fungal_depths".into(),
            difficulty_multiplier: 1.1,
            distribution: type_table(&[
                (PuzzleChamber, 0.10),
                (DiscoverySite, 0.10),
                (TradeOpportunity, 0.05),
                (RiskEvent, 0.15),
                (Hazard, 0.20),
                (RestSite, 0.10),
                (RegionShortcut, 0.05),
                (EnergyNexus, 0.15),
                (FateWeaver, 0.10),
            ]),
        },
        RegionProfile {
            name: "ancient_ruins".into(),
            difficulty_multiplier: 1.2,
            distribution: type_table(&[
                (PuzzleChamber, 0.20),
                (DiscoverySite, 0.15),
                (TradeOpportunity, 0.10),
                (Scoundrel, 0.15),
                (RiskEvent, 0.10),
                (SafePassage, 0.05),
                (RegionShortcut, 0.10),
                (FateWeaver, 0.15),
            ]),
        },
        RegionProfile {
            name: "shadow_realm".into(),
            difficulty_multiplier: 1.4,
            distribution: type_table(&[
                (Scoundrel, 0.20),
                (RiskEvent, 0.20),
                (Hazard, 0.20),
                (DiscoverySite, 0.10),
                (RestSite, 0.05),
                (SafePassage, 0.05),
                (LuckShrine, 0.10),
                (FateWeaver, 0.10),
            ]),
        },
    ];
    profiles
        .into_iter()
        .map(|p| (p.name.clone(), p))
        .collect()
}

fn default_grouping() -> GroupingSettings {
    use EncounterGrouping::*;
    GroupingSettings {
        distribution: [
            (Minigame, 0.4),
            (Loot, 0.25),
            (RecoveryAndNavigation, 0.15),
            (Passive, 0.2),
        ]
        .into_iter()
        .collect(),
        depth_constraints: [(RecoveryAndNavigation, DepthConstraint::min(11))]
            .into_iter()
            .collect(),
    }
}

impl Default for GameBalanceConfig {
    fn default() -> Self {
        Self {
            energy: EnergySettings {
                base_cost: 10.0,
                depth_multiplier: 2.0,
                min_cost: 5.0,
                max_cost: 50.0,
                type_modifiers: default_type_modifiers(),
                safety_margin_low: 20.0,
                safety_margin_medium: 50.0,
                safety_margin_high: 100.0,
            },
            reward: RewardSettings {
                depth_scaling_factor: 0.1,
                variation_base: 0.1,
                variation_depth_multiplier: 0.01,
                type_multipliers: default_reward_multipliers(),
            },
            difficulty: DifficultySettings {
                base_multiplier: 1.0,
                depth_multiplier: 0.1,
                target_bust_rate_min: 0.20,
                target_bust_rate_max: 0.30,
            },
            collection: CollectionSettings {
                set_completion_bonus_energy: 50,
                set_completion_bonus_items: 2,
            },
            encounter: EncounterSettings {
                distribution: default_distribution(),
            },
            region: RegionSettings {
                regions: default_regions(),
            },
            return_cost: ReturnCostSettings {
                base_multiplier: 5.0,
                exponent: 2.0,
            },
            grouping: default_grouping(),
        }
    }
}

impl GameBalanceConfig {
    /// Forgiving economy for new players
    pub fn easy() -> Self {
        let base = Self::default();
        Self {
            energy: EnergySettings {
                base_cost: 8.0,
                depth_multiplier: 1.5,
                min_cost: 3.0,
                max_cost: 40.0,
                safety_margin_low: 15.0,
                safety_margin_medium: 40.0,
                safety_margin_high: 80.0,
                ..base.energy
            },
            reward: RewardSettings {
                depth_scaling_factor: 0.12,
                variation_base: 0.05,
                variation_depth_multiplier: 0.005,
                ..base.reward
            },
            difficulty: DifficultySettings {
                base_multiplier: 0.8,
                depth_multiplier: 0.08,
                target_bust_rate_min: 0.10,
                target_bust_rate_max: 0.20,
            },
            collection: CollectionSettings {
                set_completion_bonus_energy: 75,
                set_completion_bonus_items: 3,
            },
            return_cost: ReturnCostSettings {
                base_multiplier: 4.0,
                exponent: 1.8,
            },
            ..base
        }
    }

    /// Punishing economy: steeper costs and return curve
    pub fn hard() -> Self {
        let base = Self::default();
        Self {
            energy: EnergySettings {
                base_cost: 12.0,
                depth_multiplier: 3.0,
                min_cost: 8.0,
                max_cost: 70.0,
                safety_margin_low: 30.0,
                safety_margin_medium: 70.0,
                safety_margin_high: 130.0,
                ..base.energy
            },
            reward: RewardSettings {
                depth_scaling_factor: 0.15,
                variation_base: 0.15,
                variation_depth_multiplier: 0.02,
                ..base.reward
            },
            difficulty: DifficultySettings {
                base_multiplier: 1.2,
                depth_multiplier: 0.15,
                target_bust_rate_min: 0.30,
                target_bust_rate_max: 0.40,
            },
            collection: CollectionSettings {
                set_completion_bonus_energy: 40,
                set_completion_bonus_items: 1,
            },
            return_cost: ReturnCostSettings {
                base_multiplier: 6.0,
                exponent: 2.2,
            },
            ..base
        }
    }

    /// Flat, variance-free numbers for tests and tooling
    pub fn testing() -> Self {
        let base = Self::default();
        Self {
            energy: EnergySettings {
                base_cost: 1.0,
                depth_multiplier: 0.0,
                min_cost: 1.0,
                max_cost: 100.0,
                type_modifiers: EncounterType::ALL.iter().map(|t| (*t, 0.0)).collect(),
                safety_margin_low: 10.0,
                safety_margin_medium: 20.0,
                safety_margin_high: 30.0,
            },
            reward: RewardSettings {
                depth_scaling_factor: 0.0,
                variation_base: 0.0,
                variation_depth_multiplier: 0.0,
                type_multipliers: EncounterType::ALL.iter().map(|t| (*t, 1.0)).collect(),
            },
            difficulty: DifficultySettings {
                base_multiplier: 1.0,
                depth_multiplier: 0.0,
                target_bust_rate_min: 0.0,
                target_bust_rate_max: 1.0,
            },
            collection: CollectionSettings {
                set_completion_bonus_energy: 10,
                set_completion_bonus_items: 1,
            },
            return_cost: ReturnCostSettings {
                base_multiplier: 1.0,
                exponent: 1.0,
            },
            ..base
        }
    }

    /// Per-section shallow merge of a JSON patch.
    ///
    /// Each top-level key names a section; fields present in the patch
    /// overwrite that section's fields, everything else is kept. Nested maps
    /// (e.g. `type_modifiers`) are replaced whole.
    pub fn merged(&self, patch: &Value) -> Result<Self, ConfigError> {
        let Value::Object(sections) = patch else {
            return Err(ConfigError::InvalidPatch(
                "patch must be a JSON object".to_string(),
            ));
        };

        let mut current = serde_json::to_value(self)?;
        let Value::Object(current_sections) = &mut current else {
            return Err(ConfigError::InvalidPatch(
                "config did not serialize to an object".to_string(),
            ));
        };

        for (name, fields) in sections {
            let Some(Value::Object(target)) = current_sections.get_mut(name) else {
                return Err(ConfigError::InvalidPatch(format!("unknown section '{name}'")));
            };
            let Value::Object(fields) = fields else {
                return Err(ConfigError::InvalidPatch(format!(
                    "section '{name}' must be an object"
                )));
            };
            for (field, value) in fields {
                if !target.contains_key(field) {
                    return Err(ConfigError::InvalidPatch(format!(
                        "unknown field '{name}.{field}'"
                    )));
                }
                target.insert(field.clone(), value.clone());
            }
        }

        serde_json::from_value(current)
            .map_err(|e| ConfigError::InvalidPatch(format!("patched config is invalid: {e}")))
    }

    /// Load a snapshot from a `.json` or `.ron` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("ron") => Ok(ron::from_str(&content)?),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn region_profile(&self, region: &str) -> Option<&RegionProfile> {
        self.region.regions.get(region)
    }
}

/// True when the four grouping weights sum to 1.0 within tolerance
pub fn validate_grouping_distribution(distribution: &BTreeMap<EncounterGrouping, f64>) -> bool {
    let total: f64 = EncounterGrouping::ALL
        .iter()
        .map(|g| distribution.get(g).copied().unwrap_or(0.0))
        .sum();
    (total - 1.0).abs() <= GROUPING_SUM_TOLERANCE
}

/// Named complete snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    Default,
    Easy,
    Hard,
    Testing,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Easy => "easy",
            Preset::Hard => "hard",
            Preset::Testing => "testing",
        }
    }

    pub fn config(&self) -> GameBalanceConfig {
        match self {
            Preset::Default => GameBalanceConfig::default(),
            Preset::Easy => GameBalanceConfig::easy(),
            Preset::Hard => GameBalanceConfig::hard(),
            Preset::Testing => GameBalanceConfig::testing(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Preset::Default),
            "easy" => Ok(Preset::Easy),
            "hard" => Ok(Preset::Hard),
            "testing" => Ok(Preset::Testing),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}
