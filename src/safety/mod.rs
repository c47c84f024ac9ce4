//! Safety margin and point-of-no-return evaluation.
//!
//! Everything here is a pure function of `(energy, return_cost, depth)` and
//! the configured thresholds, which are fractions of current energy.

use serde::{Deserialize, Serialize};

use crate::constants::{DEEP_WARNING_DEPTH, EXTREME_WARNING_DEPTH, MAX_SAFE_DEPTH_SCAN};
use crate::returncost::ReturnCostCalculator;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyThresholds {
    pub safe_threshold: f64,
    pub caution_threshold: f64,
    pub danger_threshold: f64,
    /// Extra fraction of the return cost kept in reserve
    pub safety_buffer: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            safe_threshold: 0.6,
            caution_threshold: 0.3,
            danger_threshold: 0.1,
            safety_buffer: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyZone {
    Safe,
    Caution,
    Danger,
    Critical,
}

impl SafetyZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Danger => "danger",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for SafetyZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyMargin {
    pub remaining_energy: f64,
    pub safety_percentage: f64,
    pub zone: SafetyZone,
    pub is_point_of_no_return: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskWarning {
    pub level: SafetyZone,
    /// 1-10, higher is worse
    pub severity: u8,
    pub message: String,
}

impl RiskWarning {
    fn new(level: SafetyZone, severity: u8, message: &str) -> Self {
        Self {
            level,
            severity,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Continue,
    ConsiderReturning,
    ReturnNow,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyMarginManager {
    thresholds: SafetyThresholds,
    return_costs: ReturnCostCalculator,
}

impl SafetyMarginManager {
    pub fn new(thresholds: SafetyThresholds, return_costs: ReturnCostCalculator) -> Self {
        Self {
            thresholds,
            return_costs,
        }
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.thresholds
    }

    /// `(energy - return_cost) / energy`, or `None` when energy is exhausted
    fn safety_fraction(current_energy: f64, return_cost: f64) -> Option<f64> {
        if current_energy <= 0.0 {
            None
        } else {
            Some((current_energy - return_cost) / current_energy)
        }
    }

    pub fn get_safety_zone(&self, current_energy: f64, return_cost: f64) -> SafetyZone {
        let Some(fraction) = Self::safety_fraction(current_energy, return_cost) else {
            return SafetyZone::Critical;
        };
        let t = &self.thresholds;
        if fraction >= t.safe_threshold {
            SafetyZone::Safe
        } else if fraction >= t.caution_threshold {
            SafetyZone::Caution
        } else if fraction >= t.danger_threshold {
            SafetyZone::Danger
        } else {
            SafetyZone::Critical
        }
    }

    pub fn is_point_of_no_return(&self, current_energy: f64, return_cost: f64) -> bool {
        current_energy <= 0.0 || current_energy < return_cost * (1.0 + self.thresholds.safety_buffer)
    }

    pub fn get_safety_margin(&self, current_energy: f64, return_cost: f64) -> SafetyMargin {
        SafetyMargin {
            remaining_energy: current_energy - return_cost,
            safety_percentage: Self::safety_fraction(current_energy, return_cost)
                .map_or(0.0, |f| f * 100.0),
            zone: self.get_safety_zone(current_energy, return_cost),
            is_point_of_no_return: self.is_point_of_no_return(current_energy, return_cost),
        }
    }

    /// Warnings for the current position, most severe first
    pub fn get_risk_warnings(
        &self,
        current_energy: f64,
        return_cost: f64,
        current_depth: i32,
    ) -> Vec<RiskWarning> {
        let mut warnings = Vec::new();

        match self.get_safety_zone(current_energy, return_cost) {
            SafetyZone::Safe => {}
            SafetyZone::Caution => warnings.push(RiskWarning::new(
                SafetyZone::Caution,
                3,
                "Energy reserves are getting low",
            )),
            SafetyZone::Danger => warnings.push(RiskWarning::new(
                SafetyZone::Danger,
                7,
                "Barely enough energy left to return to the surface",
            )),
            SafetyZone::Critical => warnings.push(RiskWarning::new(
                SafetyZone::Critical,
                10,
                "Not enough energy to return safely",
            )),
        }

        if current_depth >= DEEP_WARNING_DEPTH {
            warnings.push(RiskWarning::new(
                SafetyZone::Caution,
                4,
                "Return costs grow exponentially at this depth",
            ));
        }
        if current_depth >= EXTREME_WARNING_DEPTH {
            warnings.push(RiskWarning::new(
                SafetyZone::Danger,
                8,
                "Extreme depth: one bad encounter can strand you",
            ));
        }
        if self.is_point_of_no_return(current_energy, return_cost) {
            warnings.push(RiskWarning::new(
                SafetyZone::Critical,
                10,
                "Point of no return: energy is below the buffered return cost",
            ));
        }

        warnings.sort_by(|a, b| b.severity.cmp(&a.severity));
        warnings
    }

    /// Deepest depth (scanning 1..=20) whose buffered cumulative return cost
    /// still fits in `current_energy`; 0 if not even depth 1 does.
    pub fn calculate_max_safe_depth(&self, current_energy: f64) -> i32 {
        let buffer = 1.0 + self.thresholds.safety_buffer;
        let mut cumulative = 0.0;
        let mut safe = 0;
        for depth in 1..=MAX_SAFE_DEPTH_SCAN {
            cumulative += self.return_costs.calculate_base_return_cost(depth);
            if cumulative * buffer > current_energy {
                break;
            }
            safe = depth;
        }
        safe
    }

    pub fn recommend_action(
        &self,
        current_energy: f64,
        return_cost: f64,
        current_depth: i32,
    ) -> RecommendedAction {
        if self.is_point_of_no_return(current_energy, return_cost) {
            return RecommendedAction::ReturnNow;
        }
        match self.get_safety_zone(current_energy, return_cost) {
            SafetyZone::Safe if current_depth < EXTREME_WARNING_DEPTH => RecommendedAction::Continue,
            SafetyZone::Safe | SafetyZone::Caution => RecommendedAction::ConsiderReturning,
            SafetyZone::Danger | SafetyZone::Critical => RecommendedAction::ReturnNow,
        }
    }
}
