//! Seeded randomness for the engine.
//!
//! Every stochastic operation takes a `&mut SimRng` explicitly; there is no ambient or
//! thread-local generator anywhere in the crate. A run's trajectory is therefore a pure function
//! of its parameters, its seed, and the fixed order in which the day-step consumes draws.
mod sampling_algorithms;

pub use sampling_algorithms::{sample_multiple_from_known_length, sample_multiple_with_replacement};

use log::trace;
use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The random number generator threaded through a single run.
#[derive(Debug, Clone)]
pub struct SimRng {
    base_seed: u64,
    rng: StdRng,
}

impl SimRng {
    pub fn new(base_seed: u64) -> SimRng {
        trace!("creating new RNG (seed={base_seed})");
        SimRng {
            base_seed,
            rng: StdRng::seed_from_u64(base_seed),
        }
    }

    /// Creates the generator for the `run_index`-th run of a batch seeded with `base_seed`.
    pub fn for_run(base_seed: u64, run_index: usize) -> SimRng {
        SimRng::new(base_seed.wrapping_add(run_index as u64))
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Gets a random sample by applying the specified sampler function to the underlying
    /// generator.
    pub fn sample<T>(&mut self, sampler: impl FnOnce(&mut StdRng) -> T) -> T {
        sampler(&mut self.rng)
    }

    /// Gets a random sample from the specified distribution.
    pub fn sample_distr<T>(&mut self, distribution: impl Distribution<T>) -> T {
        distribution.sample(&mut self.rng)
    }

    /// Gets a random sample within the range provided by `range`.
    pub fn sample_range<S, T>(&mut self, range: S) -> T
    where
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.rng.random_range(range)
    }

    /// Gets a random boolean value which is true with probability `p`.
    ///
    /// Probabilities come from validated parameters, so `p` is always within `[0, 1]`.
    pub fn sample_bool(&mut self, p: f64) -> bool {
        self.rng.random_bool(p)
    }

    /// Counts how many of `trials` independent Bernoulli(`p`) trials succeed.
    pub fn count_successes(&mut self, trials: usize, p: f64) -> usize {
        (0..trials).filter(|_| self.sample_bool(p)).count()
    }
}
