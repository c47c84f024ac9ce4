//! Delve - Generation & Economy Core
//!
//! Deterministic-when-seeded game logic for a depth-based push-your-luck
//! dungeon crawler:
//! - Balance config, presets and energy/reward/difficulty formulas
//! - Return-to-surface cost curve with shortcut discounts
//! - Persistent shortcut catalogue
//! - Dungeon map generation (constrained weighted sampling, connectivity)
//! - Safety margins, risk warnings and the point of no return
//! - Monte-Carlo balance simulation

pub mod balance;
pub mod constants;
pub mod generation;
pub mod hotreload;
pub mod logging;
pub mod random;
pub mod returncost;
pub mod safety;
pub mod shortcuts;
pub mod storage;

pub use balance::{BalanceError, BalanceManager, EncounterGrouping, EncounterType, GameBalanceConfig, Preset};
pub use generation::{DungeonMap, DungeonMapGenerator, DungeonNode, GenerationError};
pub use random::RandomSource;
pub use returncost::ReturnCostCalculator;
pub use safety::{SafetyMarginManager, SafetyZone};
pub use shortcuts::{ShortcutInfo, ShortcutManager};
