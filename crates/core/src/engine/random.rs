//! Injectable randomness for the probabilistic revalidation trigger.

/// Source of uniform samples in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Thread-local RNG from `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Always returns the same value. Lets callers force either branch.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn sample(&self) -> f64 {
        self.0
    }
}
