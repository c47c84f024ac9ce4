//! Return-to-surface cost curve.
//!
//! Each depth has a base cost `multiplier * depth^exponent`; returning from
//! depth N costs the sum over 1..=N. Shortcuts discount that sum, either by a
//! flat factor, by the mean of the applicable shortcut factors, or per depth
//! (the "optimal" walk, which never skips depths).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::MIN_RETURN_COST_PARAM;
use crate::shortcuts::ShortcutInfo;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnCostConfig {
    pub base_multiplier: f64,
    pub exponent: f64,
    /// Fraction of the cost still paid when any shortcut is used (0.3 = 70% off)
    pub shortcut_reduction_factor: f64,
}

impl Default for ReturnCostConfig {
    fn default() -> Self {
        Self {
            base_multiplier: 5.0,
            exponent: 1.5,
            shortcut_reduction_factor: 0.3,
        }
    }
}

impl ReturnCostConfig {
    fn sanitized(self) -> Self {
        let clamp_param = |v: f64| {
            if v.is_nan() {
                MIN_RETURN_COST_PARAM
            } else {
                v.max(MIN_RETURN_COST_PARAM)
            }
        };
        Self {
            base_multiplier: clamp_param(self.base_multiplier),
            exponent: clamp_param(self.exponent),
            shortcut_reduction_factor: if self.shortcut_reduction_factor.is_nan() {
                0.0
            } else {
                self.shortcut_reduction_factor.clamp(0.0, 1.0)
            },
        }
    }
}

/// Partial override for [`ReturnCostCalculator::with_config`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnCostPatch {
    pub base_multiplier: Option<f64>,
    pub exponent: Option<f64>,
    pub shortcut_reduction_factor: Option<f64>,
}

/// Shortcuts known for an optimal-cost query
#[derive(Debug, Clone, Copy)]
pub struct ReturnPathContext<'a> {
    pub available_shortcuts: &'a [String],
    pub shortcut_map: &'a HashMap<String, ShortcutInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnCostCalculator {
    config: ReturnCostConfig,
}

impl Default for ReturnCostCalculator {
    fn default() -> Self {
        Self::new(ReturnCostConfig::default())
    }
}

impl ReturnCostCalculator {
    /// Out-of-range parameters are clamped, never rejected.
    pub fn new(config: ReturnCostConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &ReturnCostConfig {
        &self.config
    }

    /// New calculator with some parameters replaced
    pub fn with_config(&self, patch: ReturnCostPatch) -> Self {
        Self::new(ReturnCostConfig {
            base_multiplier: patch.base_multiplier.unwrap_or(self.config.base_multiplier),
            exponent: patch.exponent.unwrap_or(self.config.exponent),
            shortcut_reduction_factor: patch
                .shortcut_reduction_factor
                .unwrap_or(self.config.shortcut_reduction_factor),
        })
    }

    pub fn calculate_base_return_cost(&self, depth: i32) -> f64 {
        if depth <= 0 {
            return 0.0;
        }
        self.config.base_multiplier * (depth as f64).powf(self.config.exponent)
    }

    pub fn calculate_cumulative_return_cost(&self, depth: i32) -> f64 {
        (1..=depth.max(0))
            .map(|d| self.calculate_base_return_cost(d))
            .sum()
    }

    /// Base cost of each depth from 1 to `depth`
    pub fn calculate_return_breakdown(&self, depth: i32) -> Vec<f64> {
        (1..=depth.max(0))
            .map(|d| self.calculate_base_return_cost(d))
            .collect()
    }

    /// Whole-path discount.
    ///
    /// Without a map any supplied id applies the flat factor. With a map the
    /// mean `reduction_factor` of shortcuts found at or above `depth` is
    /// taken off the full cost.
    pub fn calculate_return_cost_with_shortcuts(
        &self,
        depth: i32,
        shortcut_ids: &[String],
        shortcut_map: Option<&HashMap<String, ShortcutInfo>>,
    ) -> f64 {
        let full = self.calculate_cumulative_return_cost(depth);
        if shortcut_ids.is_empty() {
            return full;
        }

        let Some(map) = shortcut_map else {
            return full * self.config.shortcut_reduction_factor;
        };

        let factors: Vec<f64> = shortcut_ids
            .iter()
            .filter_map(|id| map.get(id))
            .filter(|s| s.depth <= depth)
            .map(|s| s.reduction_factor)
            .collect();
        if factors.is_empty() {
            return full;
        }
        let mean = factors.iter().sum::<f64>() / factors.len() as f64;
        full * (1.0 - mean)
    }

    /// Per-depth discount: each depth pays its base cost reduced by the best
    /// available shortcut registered at exactly that depth.
    pub fn calculate_optimal_return_cost(&self, depth: i32, ctx: &ReturnPathContext<'_>) -> f64 {
        let mut best_by_depth: HashMap<i32, f64> = HashMap::new();
        for shortcut in ctx
            .available_shortcuts
            .iter()
            .filter_map(|id| ctx.shortcut_map.get(id))
        {
            let best = best_by_depth.entry(shortcut.depth).or_insert(0.0);
            *best = best.max(shortcut.reduction_factor);
        }

        (1..=depth.max(0))
            .map(|d| {
                let base = self.calculate_base_return_cost(d);
                match best_by_depth.get(&d) {
                    Some(reduction) => base * (1.0 - reduction),
                    None => base,
                }
            })
            .sum()
    }
}
