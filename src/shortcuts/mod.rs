//! Discovered shortcut catalogue.
//!
//! Shortcuts are found once and persist for the rest of the run and across
//! runs. Discovery is idempotent, and the catalogue is written back to the
//! key-value store after every successful mutation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::constants::SHORTCUT_CATALOGUE_KEY;
use crate::storage::{KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum ShortcutError {
    #[error("shortcut store error: {0}")]
    Store(#[from] StoreError),
    #[error("shortcut catalogue is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutInfo {
    pub id: String,
    /// Depth at which the shortcut was found; applies at this depth and below
    pub depth: i32,
    /// Fraction of the return cost removed, 0.0..=1.0
    pub reduction_factor: f64,
    pub description: String,
    /// Unix milliseconds, stamped on discovery when absent
    #[serde(default)]
    pub discovered_at: Option<u64>,
    #[serde(default)]
    pub usage_count: u32,
}

impl ShortcutInfo {
    pub fn new(id: impl Into<String>, depth: i32, reduction_factor: f64, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depth,
            reduction_factor,
            description: description.into(),
            discovered_at: None,
            usage_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortcutStatistics {
    pub total_shortcuts: usize,
    pub count_by_depth: BTreeMap<i32, usize>,
    pub average_reduction: f64,
    pub usage_by_id: BTreeMap<String, u32>,
    /// Highest usage count; `None` until some shortcut has been used
    pub most_used: Option<String>,
}

pub struct ShortcutManager {
    store: Arc<dyn KeyValueStore>,
    shortcuts: HashMap<String, ShortcutInfo>,
}

impl ShortcutManager {
    /// Open the catalogue persisted in `store` (empty if none yet)
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, ShortcutError> {
        let shortcuts = match store.get_string(SHORTCUT_CATALOGUE_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => HashMap::new(),
        };
        info!(count = shortcuts.len(), "shortcut catalogue loaded");
        Ok(Self { store, shortcuts })
    }

    /// Record a newly found shortcut.
    ///
    /// Returns `Ok(false)` without touching the catalogue for invalid input
    /// (`depth <= 0`, empty id or description) and for ids already known.
    pub fn discover_shortcut(&mut self, mut shortcut: ShortcutInfo) -> Result<bool, ShortcutError> {
        if shortcut.depth <= 0
            || shortcut.id.trim().is_empty()
            || shortcut.description.trim().is_empty()
        {
            debug!(id = %shortcut.id, depth = shortcut.depth, "rejected invalid shortcut");
            return Ok(false);
        }
        if self.shortcuts.contains_key(&shortcut.id) {
            return Ok(false);
        }

        shortcut.reduction_factor = if shortcut.reduction_factor.is_nan() {
            0.0
        } else {
            shortcut.reduction_factor.clamp(0.0, 1.0)
        };
        shortcut.discovered_at.get_or_insert_with(current_time_millis);

        let id = shortcut.id.clone();
        self.shortcuts.insert(id.clone(), shortcut);
        if let Err(e) = self.persist() {
            self.shortcuts.remove(&id);
            return Err(e);
        }
        info!(id = %id, "shortcut discovered");
        Ok(true)
    }

    /// Bump the usage counter of a known shortcut
    pub fn record_usage(&mut self, id: &str) -> Result<bool, ShortcutError> {
        let Some(shortcut) = self.shortcuts.get_mut(id) else {
            return Ok(false);
        };
        shortcut.usage_count += 1;
        if let Err(e) = self.persist() {
            if let Some(shortcut) = self.shortcuts.get_mut(id) {
                shortcut.usage_count -= 1;
            }
            return Err(e);
        }
        Ok(true)
    }

    pub fn get_shortcut(&self, id: &str) -> Option<&ShortcutInfo> {
        self.shortcuts.get(id)
    }

    /// All shortcuts ordered by depth, then id
    pub fn all_shortcuts(&self) -> Vec<&ShortcutInfo> {
        let mut list: Vec<&ShortcutInfo> = self.shortcuts.values().collect();
        list.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Shortcuts usable from `depth`: everything found at or above it
    pub fn get_shortcuts_at_depth(&self, depth: i32) -> Vec<&ShortcutInfo> {
        self.all_shortcuts()
            .into_iter()
            .filter(|s| s.depth <= depth)
            .collect()
    }

    /// Mean reduction of the known, applicable shortcuts among `ids`.
    ///
    /// Overlapping shortcuts are averaged, not maxed: a weak shortcut
    /// dilutes a strong one.
    pub fn calculate_effective_reduction(&self, depth: i32, ids: &[String]) -> f64 {
        let factors: Vec<f64> = ids
            .iter()
            .filter_map(|id| self.shortcuts.get(id))
            .filter(|s| s.depth <= depth)
            .map(|s| s.reduction_factor)
            .collect();
        if factors.is_empty() {
            return 0.0;
        }
        factors.iter().sum::<f64>() / factors.len() as f64
    }

    pub fn get_shortcut_statistics(&self) -> ShortcutStatistics {
        let mut stats = ShortcutStatistics {
            total_shortcuts: self.shortcuts.len(),
            ..Default::default()
        };
        if self.shortcuts.is_empty() {
            return stats;
        }

        let mut best: Option<(&str, u32)> = None;
        for shortcut in self.all_shortcuts() {
            *stats.count_by_depth.entry(shortcut.depth).or_insert(0) += 1;
            stats
                .usage_by_id
                .insert(shortcut.id.clone(), shortcut.usage_count);
            if shortcut.usage_count > best.map_or(0, |(_, count)| count) {
                best = Some((shortcut.id.as_str(), shortcut.usage_count));
            }
        }
        stats.average_reduction = self
            .shortcuts
            .values()
            .map(|s| s.reduction_factor)
            .sum::<f64>()
            / self.shortcuts.len() as f64;
        stats.most_used = best.map(|(id, _)| id.to_string());
        stats
    }

    /// Catalogue snapshot in the shape `ReturnCostCalculator` consumes
    pub fn as_reduction_map(&self) -> HashMap<String, ShortcutInfo> {
        self.shortcuts.clone()
    }

    pub fn len(&self) -> usize {
        self.shortcuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }

    /// Forget every shortcut, in memory and in the store
    pub fn clear(&mut self) -> Result<(), ShortcutError> {
        self.store.delete(SHORTCUT_CATALOGUE_KEY).map_err(|e| {
            error!("failed to clear shortcut catalogue: {}", e);
            e
        })?;
        self.shortcuts.clear();
        Ok(())
    }

    fn persist(&self) -> Result<(), ShortcutError> {
        let json = serde_json::to_string(&self.shortcuts)?;
        self.store.set(SHORTCUT_CATALOGUE_KEY, &json).map_err(|e| {
            error!("failed to persist shortcut catalogue: {}", e);
            e
        })?;
        Ok(())
    }
}

fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
