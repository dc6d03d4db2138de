//! Probability mass functions over small non-negative integer offsets.
//!
//! A [`DiscreteDistribution`] is written in configuration as a plain list of weights, where the
//! weight at index `k` is the probability of drawing `k`:
//!
//! ```json
//! "days_till_results_distribution": [0.0, 1.0]
//! ```
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::random::SimRng;

const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct DiscreteDistribution {
    weights: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl DiscreteDistribution {
    /// Validates `weights` and builds the sampler.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ParameterError`] if `weights` is empty, contains a negative or
    /// non-finite value, or does not sum to 1.
    pub fn new(weights: Vec<f64>) -> Result<DiscreteDistribution, SimError> {
        if weights.is_empty() {
            return Err(SimError::ParameterError(
                "discrete distribution has no weights".to_string(),
            ));
        }
        if let Some(weight) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(SimError::ParameterError(format!(
                "discrete distribution has invalid weight {weight}"
            )));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(SimError::ParameterError(format!(
                "discrete distribution {weights:?} sums to {total}, not 1"
            )));
        }
        let index = WeightedIndex::new(&weights).map_err(|err| {
            SimError::ParameterError(format!("discrete distribution {weights:?}: {err}"))
        })?;
        Ok(DiscreteDistribution { weights, index })
    }

    /// All mass on `offset`.
    pub fn point_mass(offset: usize) -> Result<DiscreteDistribution, SimError> {
        let mut weights = vec![0.0; offset + 1];
        weights[offset] = 1.0;
        DiscreteDistribution::new(weights)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of offsets, including those with zero mass.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Probability of drawing `offset`.
    pub fn probability(&self, offset: usize) -> f64 {
        self.weights.get(offset).copied().unwrap_or(0.0)
    }

    /// Draws one offset.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn sample(&self, rng: &mut SimRng) -> i32 {
        let offset: usize = rng.sample_distr(&self.index);
        offset as i32
    }

    /// Sum of `count` independent draws.
    pub fn sample_sum(&self, rng: &mut SimRng, count: usize) -> usize {
        (0..count)
            .map(|_| -> usize { rng.sample_distr(&self.index) })
            .sum()
    }
}

impl PartialEq for DiscreteDistribution {
    fn eq(&self, other: &Self) -> bool {
        self.weights == other.weights
    }
}

impl TryFrom<Vec<f64>> for DiscreteDistribution {
    type Error = SimError;

    fn try_from(weights: Vec<f64>) -> Result<Self, Self::Error> {
        DiscreteDistribution::new(weights)
    }
}

impl From<DiscreteDistribution> for Vec<f64> {
    fn from(distribution: DiscreteDistribution) -> Self {
        distribution.weights
    }
}
