//! Centralized constants for the delve core.
//!
//! Tunable balance numbers live in `balance::config` so presets can replace
//! them wholesale. What remains here are fixed rules of the game loop and
//! keys shared with the persistence layer.

// =====================================================
// Persistence
// =====================================================

/// Key under which the shortcut catalogue is stored (JSON object keyed by id)
pub const SHORTCUT_CATALOGUE_KEY: &str = "delve:shortcuts";

// =====================================================
// Economy
// =====================================================

/// Fixed energy buffer added on top of the expected run cost
pub const STARTING_ENERGY_BUFFER: u32 = 50;

/// Tolerance for the grouping distribution summing to 1.0
pub const GROUPING_SUM_TOLERANCE: f64 = 1e-4;

/// Minimum value for return-cost multiplier and exponent
pub const MIN_RETURN_COST_PARAM: f64 = 0.1;

/// Node cost bounds used when a loaded config carries non-finite ones
pub const FALLBACK_MIN_NODE_COST: f64 = 5.0;
pub const FALLBACK_MAX_NODE_COST: f64 = 50.0;

/// Reward values never drop below this after variance
pub const MIN_REWARD_VALUE: f64 = 1.0;

// =====================================================
// Safety
// =====================================================

/// Deepest level scanned when projecting the maximum safe depth
pub const MAX_SAFE_DEPTH_SCAN: i32 = 20;

/// Depth at which return costs start escalating noticeably
pub const DEEP_WARNING_DEPTH: i32 = 5;

/// Depth at which the return trip itself becomes dangerous
pub const EXTREME_WARNING_DEPTH: i32 = 8;

// =====================================================
// Procedural Generation
// =====================================================

/// Shortcut jumps and discounted steps never cost less than this
pub const MIN_SHORTCUT_STEP_COST: f64 = 1.0;
