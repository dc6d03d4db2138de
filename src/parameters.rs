//! Simulation configuration.
//!
//! [`Parameters`] is an explicit value, loaded once (usually from a JSON file) and passed by
//! reference into every compartment constructor. Each block has a `validate()` method; compartment
//! constructors validate the blocks they read, so malformed configuration is rejected before the
//! first day-step.
//!
//! Every field has a default, so a parameter file only needs to list what it changes:
//!
//! ```json
//! {
//!     "simulation": { "num_runs": 10, "num_days": 60 },
//!     "population": { "num_susceptible": 500, "num_infected": 5 }
//! }
//! ```
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::distribution::DiscreteDistribution;
use crate::error::SimError;
use crate::viral_load::ViralLoadParameters;

fn check_probability(name: &str, value: f64) -> Result<(), SimError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SimError::ParameterError(format!(
            "{name} must be a probability in [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_threshold(name: &str, value: f64) -> Result<(), SimError> {
    if !value.is_finite() {
        return Err(SimError::ParameterError(format!(
            "{name} must be finite, got {value}"
        )));
    }
    Ok(())
}

// Fails to build only if a literal default below is malformed.
fn default_distribution(weights: Vec<f64>) -> DiscreteDistribution {
    match DiscreteDistribution::new(weights) {
        Ok(distribution) => distribution,
        Err(err) => panic!("built-in default distribution is invalid: {err}"),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParameters {
    /// Number of independent runs in a batch.
    pub num_runs: usize,
    /// Number of day-steps per run.
    pub num_days: usize,
    /// Base seed; run `i` is seeded with `seed + i`.
    pub seed: u64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        SimulationParameters {
            num_runs: 100,
            num_days: 100,
            seed: 0,
        }
    }
}

impl SimulationParameters {
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if `num_runs` is zero.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_runs == 0 {
            return Err(SimError::ParameterError(
                "num_runs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ResultsParameters {
    /// Directory holding every batch; created if missing.
    pub main_results_dir: String,
    /// Prefix of the indexed batch directories inside `main_results_dir`.
    pub batch_dir: String,
    /// Prefix of the indexed per-run files inside a batch directory.
    pub run_filename: String,
}

impl Default for ResultsParameters {
    fn default() -> Self {
        ResultsParameters {
            main_results_dir: "results".to_string(),
            batch_dir: "batch".to_string(),
            run_filename: "run".to_string(),
        }
    }
}

impl ResultsParameters {
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if a name is empty or `batch_dir`/`run_filename`
    /// contain a path separator.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.main_results_dir.is_empty() {
            return Err(SimError::ParameterError(
                "main_results_dir must not be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("batch_dir", &self.batch_dir),
            ("run_filename", &self.run_filename),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(SimError::ParameterError(format!(
                    "{name} must be a plain, non-empty file name, got {value:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Infection, testing and contact-tracing configuration of the general population.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PopulationParameters {
    pub num_susceptible: usize,
    pub num_infected: usize,
    /// Days since infection of the initially infected agents, where offset 0 means infected
    /// yesterday.
    pub initial_infection_distribution: DiscreteDistribution,

    /// Minimum log10 viral load at which an agent transmits.
    pub infectious_threshold: f64,
    pub probability_infection_given_contact: f64,
    /// Daily probability of infection from outside the population.
    pub probability_outside_infection: f64,
    pub daily_contacts_distribution: DiscreteDistribution,

    /// Fraction of the population selected for testing each day.
    pub proportion_tested_daily: f64,
    /// Minimum log10 viral load at which a test comes back positive.
    pub detectable_threshold: f64,
    pub days_till_results_distribution: DiscreteDistribution,
}

impl Default for PopulationParameters {
    fn default() -> Self {
        let mut initial_infection = vec![1.0 / 7.0; 8];
        initial_infection[0] = 0.0;
        PopulationParameters {
            num_susceptible: 950,
            num_infected: 50,
            initial_infection_distribution: default_distribution(initial_infection),
            infectious_threshold: 6.0,
            probability_infection_given_contact: 0.1,
            probability_outside_infection: 0.001,
            daily_contacts_distribution: default_distribution(vec![0.0, 0.5, 0.5]),
            proportion_tested_daily: 1.0 / 14.0,
            detectable_threshold: 4.0,
            days_till_results_distribution: default_distribution(vec![0.0, 1.0]),
        }
    }
}

impl PopulationParameters {
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if a probability or fraction lies outside `[0, 1]` or
    /// a threshold is not finite.
    pub fn validate(&self) -> Result<(), SimError> {
        check_threshold("infectious_threshold", self.infectious_threshold)?;
        check_threshold("detectable_threshold", self.detectable_threshold)?;
        check_probability(
            "probability_infection_given_contact",
            self.probability_infection_given_contact,
        )?;
        check_probability(
            "probability_outside_infection",
            self.probability_outside_infection,
        )?;
        check_probability("proportion_tested_daily", self.proportion_tested_daily)?;
        Ok(())
    }

    pub fn population_size(&self) -> usize {
        self.num_susceptible + self.num_infected
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QuarantineParameters {
    /// Length of an ordinary quarantine stay.
    pub days_in_quarantine: u32,
    /// Days from a case being isolated to a traced contact entering quarantine.
    pub days_till_quarantine_distribution: DiscreteDistribution,
    /// Probability that a traced contact is reached.
    pub probability_successful_contact: f64,
    /// Probability that a quarantined agent occupies a quarantine facility bed.
    pub probability_using_quarantine_resources: f64,
}

impl Default for QuarantineParameters {
    fn default() -> Self {
        QuarantineParameters {
            days_in_quarantine: 12,
            days_till_quarantine_distribution: default_distribution(vec![0.0, 0.5, 0.5]),
            probability_successful_contact: 0.75,
            probability_using_quarantine_resources: 0.5,
        }
    }
}

impl QuarantineParameters {
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if a probability lies outside `[0, 1]` or the
    /// quarantine delay distribution puts mass on 0 days. A scheduled delay is decremented
    /// before it is checked, so it must start at 1 or more.
    pub fn validate(&self) -> Result<(), SimError> {
        check_probability(
            "probability_successful_contact",
            self.probability_successful_contact,
        )?;
        check_probability(
            "probability_using_quarantine_resources",
            self.probability_using_quarantine_resources,
        )?;
        if self.days_till_quarantine_distribution.probability(0) > 0.0 {
            return Err(SimError::ParameterError(
                "days_till_quarantine_distribution must have zero mass at 0 days".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IsolationParameters {
    pub days_in_isolation: u32,
    /// Whether agents leaving isolation may be tested again.
    pub eligible_for_retesting: bool,
    /// Probability that an isolated agent occupies an isolation facility bed.
    pub probability_using_isolation_resources: f64,
}

impl Default for IsolationParameters {
    fn default() -> Self {
        IsolationParameters {
            days_in_isolation: 8,
            eligible_for_retesting: false,
            probability_using_isolation_resources: 0.5,
        }
    }
}

impl IsolationParameters {
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if the stay is shorter than one day or the probability
    /// lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.days_in_isolation == 0 {
            return Err(SimError::ParameterError(
                "days_in_isolation must be at least 1".to_string(),
            ));
        }
        check_probability(
            "probability_using_isolation_resources",
            self.probability_using_isolation_resources,
        )
    }
}

/// The full configuration of a batch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    pub simulation: SimulationParameters,
    pub results: ResultsParameters,
    pub population: PopulationParameters,
    pub quarantine: QuarantineParameters,
    pub isolation: IsolationParameters,
    pub viral_load: ViralLoadParameters,
}

impl Parameters {
    /// Validates every block.
    ///
    /// # Errors
    ///
    /// Returns the first `SimError::ParameterError` found.
    pub fn validate(&self) -> Result<(), SimError> {
        self.simulation.validate()?;
        self.results.validate()?;
        self.population.validate()?;
        self.quarantine.validate()?;
        self.isolation.validate()?;
        self.viral_load.validate()
    }

    /// Parses and validates parameters from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `SimError::JsonError` if the text is not a valid parameter document (unknown keys
    /// and malformed distributions included) and `SimError::ParameterError` if a value is out of
    /// range.
    pub fn from_json_str(text: &str) -> Result<Parameters, SimError> {
        let parameters: Parameters = serde_json::from_str(text)?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Loads and validates parameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `SimError::IoError` if the file cannot be read, otherwise as
    /// [`Parameters::from_json_str`].
    pub fn from_json_file(path: &Path) -> Result<Parameters, SimError> {
        let text = fs::read_to_string(path)?;
        Parameters::from_json_str(&text)
    }

    /// Serializes the parameters as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `SimError::JsonError` if serialization fails.
    pub fn to_json_string(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
