//! Region-unlock collaborator.
//!
//! The generator only needs one answer from the unlock tracker: is there
//! anything left to unlock? When every known region is open, discovery sites
//! (whose purpose is revealing regions) stop appearing.

use std::collections::BTreeSet;

pub trait RegionUnlocks: Send + Sync {
    fn is_region_unlocked(&self, region: &str) -> bool;
    fn unlocked_regions(&self) -> Vec<String>;
}

/// Fixed unlock set, e.g. restored from a save
#[derive(Debug, Clone, Default)]
pub struct StaticRegionUnlocks {
    unlocked: BTreeSet<String>,
}

impl StaticRegionUnlocks {
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unlocked: regions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unlock(&mut self, region: impl Into<String>) -> bool {
        self.unlocked.insert(region.into())
    }
}

impl RegionUnlocks for StaticRegionUnlocks {
    fn is_region_unlocked(&self, region: &str) -> bool {
        self.unlocked.contains(region)
    }

    fn unlocked_regions(&self) -> Vec<String> {
        self.unlocked.iter().cloned().collect()
    }
}

/// True when at least one region is known and all known regions are unlocked
pub fn all_regions_unlocked<'a>(
    unlocks: &dyn RegionUnlocks,
    known_regions: impl IntoIterator<Item = &'a String>,
) -> bool {
    let unlocked: BTreeSet<String> = unlocks.unlocked_regions().into_iter().collect();
    let mut any = false;
    for region in known_regions {
        any = true;
        if !unlocked.contains(region) {
            return false;
        }
    }
    any
}
