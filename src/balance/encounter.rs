//! Encounter taxonomy: types, their coarse groupings and depth gates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every kind of node a dungeon level can hold.
///
/// Declaration order matters: weight tables iterate in this order, so ties in
/// weighted selection favour the earlier variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterType {
    PuzzleChamber,
    TradeOpportunity,
    DiscoverySite,
    RiskEvent,
    Hazard,
    Scoundrel,
    RestSite,
    SafePassage,
    RegionShortcut,
    LuckShrine,
    EnergyNexus,
    FateWeaver,
}

impl EncounterType {
    pub const ALL: [EncounterType; 12] = [
        EncounterType::PuzzleChamber,
        EncounterType::TradeOpportunity,
        EncounterType::DiscoverySite,
        EncounterType::RiskEvent,
        EncounterType::Hazard,
        EncounterType::Scoundrel,
        EncounterType::RestSite,
        EncounterType::SafePassage,
        EncounterType::RegionShortcut,
        EncounterType::LuckShrine,
        EncounterType::EnergyNexus,
        EncounterType::FateWeaver,
    ];

    pub fn all() -> &'static [EncounterType] {
        &Self::ALL
    }

    pub fn grouping(&self) -> EncounterGrouping {
        match self {
            Self::PuzzleChamber | Self::RiskEvent | Self::Hazard | Self::Scoundrel => {
                EncounterGrouping::Minigame
            }
            Self::TradeOpportunity | Self::DiscoverySite => EncounterGrouping::Loot,
            Self::RestSite | Self::SafePassage | Self::RegionShortcut => {
                EncounterGrouping::RecoveryAndNavigation
            }
            Self::LuckShrine | Self::EnergyNexus | Self::FateWeaver => EncounterGrouping::Passive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PuzzleChamber => "puzzle_chamber",
            Self::TradeOpportunity => "trade_opportunity",
            Self::DiscoverySite => "discovery_site",
            Self::RiskEvent => "risk_event",
            Self::Hazard => "hazard",
            Self::Scoundrel => "scoundrel",
            Self::RestSite => "rest_site",
            Self::SafePassage => "safe_passage",
            Self::RegionShortcut => "region_shortcut",
            Self::LuckShrine => "luck_shrine",
            Self::EnergyNexus => "energy_nexus",
            Self::FateWeaver => "fate_weaver",
        }
    }
}

impl fmt::Display for EncounterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category used for depth gating and per-level variety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterGrouping {
    Minigame,
    Loot,
    RecoveryAndNavigation,
    Passive,
}

impl EncounterGrouping {
    pub const ALL: [EncounterGrouping; 4] = [
        EncounterGrouping::Minigame,
        EncounterGrouping::Loot,
        EncounterGrouping::RecoveryAndNavigation,
        EncounterGrouping::Passive,
    ];

    pub fn members(&self) -> Vec<EncounterType> {
        EncounterType::ALL
            .iter()
            .copied()
            .filter(|t| t.grouping() == *self)
            .collect()
    }
}

/// Inclusive depth window in which a grouping may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DepthConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_depth: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<i32>,
}

impl DepthConstraint {
    pub fn min(depth: i32) -> Self {
        Self {
            min_depth: Some(depth),
            max_depth: None,
        }
    }

    pub fn allows(&self, depth: i32) -> bool {
        let above_min = self.min_depth.map_or(true, |min| depth >= min);
        let below_max = self.max_depth.map_or(true, |max| depth <= max);
        above_min && below_max
    }
}

/// What an encounter module hands back to the run layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncounterReward {
    pub energy: i32,
    pub items: Vec<String>,
    pub xp: u32,
}
