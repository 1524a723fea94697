//! Deterministic RNG wrapper, seed-derivation rule, and draw helpers.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Deterministic RNG handle exposed to MESA consumers.
///
/// The handle is a thin wrapper around `StdRng` that documents the seeding
/// policy used throughout the project. A master `seed: u64` must be provided by
/// the caller. Substreams are derived by hashing `(master_seed, substream_id)`
/// with SipHash-1-3 configured with fixed zero keys. This rule is stable across
/// platforms and must be used whenever deterministic branching is required.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns a mutable reference to the underlying RNG for advanced usage.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Draws a uniform value on the half-open interval `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Draws a uniform value on the half-open interval `[lo, hi)`.
    pub fn uniform_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.uniform()
    }

    /// Draws a uniformly distributed index in `0..len`.
    ///
    /// `len` must be positive.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Draws a normal variate with the given mean and standard deviation.
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let dist = Normal::new(mean, std_dev).unwrap_or_else(|_| Normal::new(mean, 0.0).unwrap());
        dist.sample(&mut self.rng)
    }

    /// Draws from a zero-mean normal truncated to `[-half_width, half_width]`
    /// by rejection.
    pub fn truncated_normal(&mut self, std_dev: f64, half_width: f64) -> f64 {
        loop {
            let draw = self.normal(0.0, std_dev);
            if draw.abs() <= half_width {
                return draw;
            }
        }
    }

    /// Draws an inverse-gamma variate with the given shape and scale.
    ///
    /// If `X ~ Gamma(shape, rate = scale)` then `1 / X ~ InvGamma(shape, scale)`,
    /// so the draw is the reciprocal of a gamma variate with scale `1 / scale`.
    pub fn inverse_gamma(&mut self, shape: f64, scale: f64) -> f64 {
        let dist = Gamma::new(shape, 1.0 / scale).expect("inverse-gamma parameters");
        1.0 / dist.sample(&mut self.rng)
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_stream() {
        let mut a = RngHandle::from_seed(99);
        let mut b = RngHandle::from_seed(99);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn substream_derivation_is_stable() {
        let first = derive_substream_seed(42, 7);
        let second = derive_substream_seed(42, 7);
        assert_eq!(first, second);
        assert_ne!(first, derive_substream_seed(42, 8));
    }

    #[test]
    fn truncated_normal_respects_bounds() {
        let mut rng = RngHandle::from_seed(5);
        for _ in 0..200 {
            let draw = rng.truncated_normal(3.0, 1.5);
            assert!(draw.abs() <= 1.5);
        }
    }

    #[test]
    fn inverse_gamma_is_positive() {
        let mut rng = RngHandle::from_seed(11);
        for _ in 0..100 {
            assert!(rng.inverse_gamma(2.5, 1.0) > 0.0);
        }
    }
}
