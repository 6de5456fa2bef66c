use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Uniform random numbers as the simulation consumes them.
///
/// Any [`rand::Rng`] is a source, tests and the flock use a seeded
/// [`Xoshiro256PlusPlus`] so runs can be replayed.
pub trait RandomSource {
    /// uniform in `[0, 1)`
    fn uniform(&mut self) -> f32;

    /// uniform in `[lo, hi)`, collapses to `lo` for an empty range
    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            lo
        } else {
            lo + (hi - lo) * self.uniform()
        }
    }

    /// fair coin flip
    fn coin(&mut self) -> bool {
        self.uniform() > 0.5
    }
}

impl<R: Rng> RandomSource for R {
    fn uniform(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

/// Seeded generator, or one seeded from entropy when no seed is given
pub fn flock_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}
