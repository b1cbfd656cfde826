//! Random number generation and bootstrap index draws.
//!
//! Provides seeded RNG construction and the uniform-with-replacement
//! index and standard-normal draws used by the posterior resampler.
//!
//! # Reproducibility
//!
//! For reproducible experiments, use [`create_rng`] with a fixed seed.
//! The underlying algorithm (SmallRng) is deterministic for a given seed
//! on the same platform.

use rand::Rng;
use rand_distr::StandardNormal;

/// Creates a fast, seeded random number generator.
///
/// Uses `SmallRng` (Xoshiro256++) for high performance.
/// The sequence is deterministic for a given seed on the same platform.
///
/// # Examples
/// ```
/// use stellarprop::random::create_rng;
/// use rand::Rng;
/// let mut rng = create_rng(42);
/// let x: f64 = rng.random();
/// assert!(x >= 0.0 && x < 1.0);
/// ```
pub fn create_rng(seed: u64) -> rand::rngs::SmallRng {
    use rand::SeedableRng;
    rand::rngs::SmallRng::seed_from_u64(seed)
}

/// Draws `count` indices uniformly from `[0, len)` with replacement.
///
/// Returns an empty vector when `len == 0`.
///
/// # Complexity
/// Time: O(count), Space: O(count)
///
/// # Examples
/// ```
/// use stellarprop::random::{create_rng, sample_indices};
/// let mut rng = create_rng(7);
/// let idx = sample_indices(10, 1000, &mut rng);
/// assert_eq!(idx.len(), 1000);
/// assert!(idx.iter().all(|&i| i < 10));
/// ```
pub fn sample_indices<R: Rng>(len: usize, count: usize, rng: &mut R) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    (0..count).map(|_| rng.random_range(0..len)).collect()
}

/// Draws `count` independent N(0, 1) variates.
pub fn standard_normals<R: Rng>(count: usize, rng: &mut R) -> Vec<f64> {
    (0..count).map(|_| rng.sample(StandardNormal)).collect()
}

// ============================================================================
// Tests
// ============================================================================
