//! Injectable randomness.
//!
//! Every formula that consumes randomness (reward variance, encounter
//! sampling, node jitter, shortcut injection) draws through
//! [`RandomSource`]. Any `rand::RngCore` is a source, so production code can
//! pass `rand::thread_rng()` while tests and simulations pass a seeded
//! Xoshiro generator.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use sha3::{Digest, Sha3_256};

/// Uniform randomness in `[0, 1)` plus the derived helpers the core uses.
pub trait RandomSource {
    fn next_float(&mut self) -> f64;

    /// Uniform float in `[min, max)`
    fn range_f64(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_float() * (max - min)
    }

    /// Uniform integer in `[min, max]` (inclusive both ends)
    fn range_i32(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f64;
        let offset = (self.next_float() * span).floor() as i32;
        min + offset.min(max - min)
    }

    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool {
        self.next_float() < p
    }

    /// Uniform index into a slice of `len` elements (`len` must be > 0)
    fn pick_index(&mut self, len: usize) -> usize {
        let idx = (self.next_float() * len as f64).floor() as usize;
        idx.min(len.saturating_sub(1))
    }
}

impl<R: RngCore + ?Sized> RandomSource for R {
    fn next_float(&mut self) -> f64 {
        // 53 random mantissa bits -> [0, 1)
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// Seeded generator used for reproducible maps and simulations
pub fn seeded(seed: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

/// Derive a child seed from a root seed and a salt (run index, depth, ...)
pub fn derive_seed(seed: u64, salt: u64) -> u64 {
    let mut hasher = Sha3_256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(salt.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(bytes)
}
