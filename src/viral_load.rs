//! Personalized viral-load trajectories.
//!
//! Each agent carries a [`ViralLoadCurve`] generated once, at creation, from a randomized
//! piecewise-linear model in log10 units: the load jumps to `onset_load` on the onset day, rises
//! linearly to a peak, then declines linearly until it falls back to `onset_load`, after which it
//! is zero. The final day of the horizon is always zero so every infection eventually resolves.
use rand::distr::Uniform;
use rand_distr::Gamma;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::random::SimRng;

/// Number of days covered by a viral-load curve.
pub const VIRAL_LOAD_HORIZON: usize = 28;

/// Constants of the randomized viral-load model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ViralLoadParameters {
    /// Bounds of the uniformly distributed onset day.
    pub onset_day_range: (f64, f64),
    /// Fixed minimum delay between onset and peak.
    pub peak_lag: f64,
    /// Shape of the gamma-distributed additional delay between onset and peak.
    pub peak_delay_shape: f64,
    /// Scale of the gamma-distributed additional delay between onset and peak.
    pub peak_delay_scale: f64,
    /// Bounds of the uniformly distributed time from peak until the load reaches
    /// `decline_reference_load`.
    pub decline_duration_range: (f64, f64),
    /// Bounds of the uniformly distributed peak load.
    pub peak_magnitude_range: (f64, f64),
    /// Load on the onset day, and the floor below which the declining load drops to zero.
    pub onset_load: f64,
    /// Load reached at the end of the decline duration; fixes the slope of the decline.
    pub decline_reference_load: f64,
}

impl Default for ViralLoadParameters {
    fn default() -> Self {
        ViralLoadParameters {
            onset_day_range: (2.5, 3.5),
            peak_lag: 0.2,
            peak_delay_shape: 1.8,
            peak_delay_scale: 1.0,
            decline_duration_range: (5.0, 10.0),
            peak_magnitude_range: (7.0, 11.0),
            onset_load: 3.0,
            decline_reference_load: 6.0,
        }
    }
}

fn check_range(name: &str, (low, high): (f64, f64)) -> Result<(), SimError> {
    if !low.is_finite() || !high.is_finite() || low > high {
        return Err(SimError::ParameterError(format!(
            "{name} must be a finite range with low <= high, got ({low}, {high})"
        )));
    }
    Ok(())
}

impl ViralLoadParameters {
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if a range is malformed, onset can fall on or after the
    /// last day of the horizon, or the loads are not ordered
    /// `0 <= onset_load < decline_reference_load < peak_magnitude_range.0`.
    pub fn validate(&self) -> Result<(), SimError> {
        check_range("onset_day_range", self.onset_day_range)?;
        check_range("decline_duration_range", self.decline_duration_range)?;
        check_range("peak_magnitude_range", self.peak_magnitude_range)?;

        if self.onset_day_range.0 < 0.0 {
            return Err(SimError::ParameterError(
                "onset_day_range must not start before day 0".to_string(),
            ));
        }
        if self.onset_day_range.1 >= (VIRAL_LOAD_HORIZON - 1) as f64 {
            return Err(SimError::ParameterError(format!(
                "onset_day_range must end before day {}, got {}",
                VIRAL_LOAD_HORIZON - 1,
                self.onset_day_range.1
            )));
        }
        if !(self.peak_lag > 0.0 && self.peak_lag.is_finite()) {
            return Err(SimError::ParameterError(format!(
                "peak_lag must be positive, got {}",
                self.peak_lag
            )));
        }
        if self.decline_duration_range.0 <= 0.0 {
            return Err(SimError::ParameterError(
                "decline_duration_range must be strictly positive".to_string(),
            ));
        }
        if !(self.onset_load >= 0.0
            && self.onset_load < self.decline_reference_load
            && self.decline_reference_load < self.peak_magnitude_range.0)
        {
            return Err(SimError::ParameterError(format!(
                "viral loads must satisfy 0 <= onset_load ({}) < decline_reference_load ({}) < \
                 minimum peak magnitude ({})",
                self.onset_load, self.decline_reference_load, self.peak_magnitude_range.0
            )));
        }
        Ok(())
    }
}

/// The sampling distributions behind [`ViralLoadParameters`], built once per population.
#[derive(Debug, Clone)]
pub struct ViralLoadModel {
    onset_day: Uniform<f64>,
    peak_delay: Gamma<f64>,
    decline_duration: Uniform<f64>,
    peak_magnitude: Uniform<f64>,
    peak_lag: f64,
    onset_load: f64,
    decline_reference_load: f64,
}

fn uniform(name: &str, (low, high): (f64, f64)) -> Result<Uniform<f64>, SimError> {
    Uniform::new_inclusive(low, high)
        .map_err(|e| SimError::ParameterError(format!("{name}: {e}")))
}

impl ViralLoadModel {
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if the parameters fail validation.
    pub fn new(parameters: &ViralLoadParameters) -> Result<ViralLoadModel, SimError> {
        parameters.validate()?;
        let peak_delay = Gamma::new(parameters.peak_delay_shape, parameters.peak_delay_scale)
            .map_err(|e| SimError::ParameterError(format!("peak delay: {e}")))?;
        Ok(ViralLoadModel {
            onset_day: uniform("onset_day_range", parameters.onset_day_range)?,
            peak_delay,
            decline_duration: uniform("decline_duration_range", parameters.decline_duration_range)?,
            peak_magnitude: uniform("peak_magnitude_range", parameters.peak_magnitude_range)?,
            peak_lag: parameters.peak_lag,
            onset_load: parameters.onset_load,
            decline_reference_load: parameters.decline_reference_load,
        })
    }

    /// Draws a new personalized curve. Consumes exactly four draws, in the order onset day, peak
    /// delay, decline duration, peak magnitude.
    pub fn generate(&self, rng: &mut SimRng) -> ViralLoadCurve {
        let onset = rng.sample_distr(&self.onset_day);
        let peak = onset + self.peak_lag + rng.sample_distr(&self.peak_delay);
        let decline_reference_day = peak + rng.sample_distr(&self.decline_duration);
        let peak_load = rng.sample_distr(&self.peak_magnitude);

        let rise_slope = (peak_load - self.onset_load) / (peak - onset);
        let decline_slope =
            (self.decline_reference_load - peak_load) / (decline_reference_day - peak);
        // Day on which the decline reaches `onset_load` again.
        let end = (self.onset_load - peak_load) / decline_slope + peak;

        let mut values = [0.0; VIRAL_LOAD_HORIZON];
        for (day, value) in values.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let t = day as f64;
            *value = if t >= onset && t < peak {
                rise_slope * (t - onset) + self.onset_load
            } else if t >= peak && t <= end {
                (decline_slope * (t - peak) + peak_load).max(0.0)
            } else {
                0.0
            };
        }
        values[VIRAL_LOAD_HORIZON - 1] = 0.0;

        ViralLoadCurve { values }
    }
}

/// A per-agent viral-load trajectory indexed by days since infection onset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViralLoadCurve {
    values: [f64; VIRAL_LOAD_HORIZON],
}

impl ViralLoadCurve {
    /// Builds a curve from explicit values. The final entry is forced to zero.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if any value is negative or not finite.
    pub fn from_values(mut values: [f64; VIRAL_LOAD_HORIZON]) -> Result<ViralLoadCurve, SimError> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SimError::ParameterError(format!(
                "viral load values must be finite and non-negative, got {bad}"
            )));
        }
        values[VIRAL_LOAD_HORIZON - 1] = 0.0;
        Ok(ViralLoadCurve { values })
    }

    pub fn values(&self) -> &[f64; VIRAL_LOAD_HORIZON] {
        &self.values
    }

    /// The load `day` days after onset. Days outside the horizon read as zero.
    pub fn at(&self, day: i32) -> f64 {
        usize::try_from(day)
            .ok()
            .and_then(|day| self.values.get(day))
            .copied()
            .unwrap_or(0.0)
    }

    /// The first day at or after `from_day` whose load is strictly above `threshold`.
    pub fn first_day_above(&self, threshold: f64, from_day: i32) -> Option<i32> {
        let start = from_day.max(0);
        (start..VIRAL_LOAD_HORIZON as i32).find(|&day| self.at(day) > threshold)
    }

}

#[cfg(test)]
mod test {
    use super::*;

    fn default_model() -> ViralLoadModel {
        ViralLoadModel::new(&ViralLoadParameters::default()).unwrap()
    }

    fn peak(curve: &ViralLoadCurve) -> f64 {
        curve.values().iter().copied().fold(0.0, f64::max)
    }

    #[test]
    fn generated_curves_have_the_expected_shape() {
        let model = default_model();
        let mut rng = SimRng::new(42);
        for _ in 0..500 {
            let curve = model.generate(&mut rng);
            let values = curve.values();
            assert_eq!(values.len(), VIRAL_LOAD_HORIZON);
            assert!(values.iter().all(|v| *v >= 0.0));
            assert_eq!(values[VIRAL_LOAD_HORIZON - 1], 0.0);
            // Onset is never before day 2.5, so the first three days are clear.
            assert_eq!(&values[..3], &[0.0, 0.0, 0.0]);
            // Every infection produces some load, capped by the maximum peak magnitude.
            assert!(peak(&curve) >= 3.0);
            assert!(peak(&curve) <= 11.0);
        }
    }

    #[test]
    fn positive_days_are_contiguous() {
        let model = default_model();
        let mut rng = SimRng::new(3);
        for _ in 0..200 {
            let curve = model.generate(&mut rng);
            let positive: Vec<usize> = curve
                .values()
                .iter()
                .enumerate()
                .filter(|(_, v)| **v > 0.0)
                .map(|(day, _)| day)
                .collect();
            assert!(!positive.is_empty());
            assert!(positive.windows(2).all(|pair| pair[1] == pair[0] + 1));
        }
    }

    #[test]
    fn generation_is_reproducible() {
        let model = default_model();
        let first = model.generate(&mut SimRng::new(11));
        let second = model.generate(&mut SimRng::new(11));
        assert_eq!(first, second);
    }

    #[test]
    fn fixed_parameters_give_a_known_curve() {
        let parameters = ViralLoadParameters {
            onset_day_range: (3.0, 3.0),
            peak_lag: 2.0,
            // A tiny gamma scale keeps the peak delay effectively at `peak_lag`.
            peak_delay_shape: 1.0,
            peak_delay_scale: 1e-12,
            decline_duration_range: (4.0, 4.0),
            peak_magnitude_range: (9.0, 9.0),
            onset_load: 3.0,
            decline_reference_load: 6.0,
        };
        let curve = ViralLoadModel::new(&parameters)
            .unwrap()
            .generate(&mut SimRng::new(0));
        // Rise: 3 at day 3, 6 at day 4; decline from 9 at day 5 by 0.75 per day to 3 at day 13.
        approx::assert_abs_diff_eq!(curve.at(2), 0.0);
        approx::assert_abs_diff_eq!(curve.at(3), 3.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(curve.at(4), 6.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(curve.at(5), 9.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(curve.at(9), 6.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(curve.at(12), 3.75, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(curve.at(14), 0.0);
    }

    #[test]
    fn out_of_horizon_reads_as_zero() {
        let curve = ViralLoadCurve::from_values([5.0; VIRAL_LOAD_HORIZON]).unwrap();
        assert_eq!(curve.at(-1), 0.0);
        assert_eq!(curve.at(0), 5.0);
        assert_eq!(curve.at(27), 0.0);
        assert_eq!(curve.at(28), 0.0);
        assert_eq!(curve.at(400), 0.0);
    }

    #[test]
    fn from_values_rejects_negative_loads() {
        let mut values = [0.0; VIRAL_LOAD_HORIZON];
        values[4] = -1.0;
        assert!(matches!(
            ViralLoadCurve::from_values(values),
            Err(SimError::ParameterError(_))
        ));
    }

    #[test]
    fn first_day_above_scans_forward() {
        let mut values = [0.0; VIRAL_LOAD_HORIZON];
        values[3] = 5.0;
        values[4] = 7.0;
        values[10] = 7.0;
        let curve = ViralLoadCurve::from_values(values).unwrap();
        assert_eq!(curve.first_day_above(6.0, 0), Some(4));
        assert_eq!(curve.first_day_above(6.0, 5), Some(10));
        assert_eq!(curve.first_day_above(6.0, 11), None);
        assert_eq!(curve.first_day_above(7.0, 0), None);
        assert_eq!(curve.first_day_above(4.0, -3), Some(3));
    }

    #[test]
    fn invalid_parameters_fail_fast() {
        let parameters = ViralLoadParameters {
            decline_reference_load: 8.0,
            ..ViralLoadParameters::default()
        };
        assert!(ViralLoadModel::new(&parameters).is_err());

        let parameters = ViralLoadParameters {
            onset_day_range: (4.0, 3.0),
            ..ViralLoadParameters::default()
        };
        assert!(ViralLoadModel::new(&parameters).is_err());

        let parameters = ViralLoadParameters {
            peak_delay_shape: 0.0,
            ..ViralLoadParameters::default()
        };
        assert!(ViralLoadModel::new(&parameters).is_err());

        // An onset past the horizon would leave every curve at zero.
        for onset_day_range in [(30.0, 31.0), (20.0, 27.0)] {
            let parameters = ViralLoadParameters {
                onset_day_range,
                ..ViralLoadParameters::default()
            };
            assert!(matches!(
                ViralLoadModel::new(&parameters),
                Err(SimError::ParameterError(_))
            ));
        }
        let parameters = ViralLoadParameters {
            onset_day_range: (20.0, 26.5),
            ..ViralLoadParameters::default()
        };
        assert!(ViralLoadModel::new(&parameters).is_ok());
    }
}
