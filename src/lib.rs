//! An individual-based epidemic model with testing, contact tracing, quarantine and isolation
//!
//! Every agent carries a 28-day viral load curve and a set of status flags and timers. Agents
//! live in exactly one of three compartments at a time:
//! * the general population, where infections progress, susceptible agents are exposed, a share
//!   of the population is tested each day and the contacts of new cases are traced;
//! * quarantine, which holds traced contacts for a fixed period and transfers those who turn out
//!   to be infected;
//! * isolation, which holds confirmed cases for a fixed period.
//!
//! A [`Simulation`] advances all three compartments one day at a time and logs their counts. The
//! [`runner`] module drives batches of independently seeded runs and writes each one, together
//! with the parameters used and the per-day averages, into a fresh batch directory.
//!
//! All randomness flows through one explicitly seeded [`SimRng`] per run, so a run is fully
//! determined by its parameters and seed.
pub mod agent;
pub mod agent_store;
pub mod compartment;
pub mod distribution;
pub mod error;
pub mod general_population;
pub mod isolation;
pub mod log;
pub mod parameters;
pub mod quarantine;
pub mod query;
pub mod random;
pub mod report;
pub mod runner;
pub mod simulation;
pub mod summary;
pub mod viral_load;

pub use agent::{Agent, AgentId, AgentUpdate, Flag, Timer};
pub use agent_store::AgentStore;
pub use compartment::{Cohort, CompartmentLog};
pub use distribution::DiscreteDistribution;
pub use error::SimError;
pub use general_population::{GeneralPopulation, PopulationLog};
pub use isolation::Isolation;
pub use parameters::Parameters;
pub use quarantine::{Quarantine, QuarantineRelease};
pub use query::{AgentPredicate, AgentQuery};
pub use random::SimRng;
pub use report::{DailyRecord, ResultsWriter, RunResults};
pub use runner::{run_batch, run_with_args, BaseArgs, BatchOutcome};
pub use simulation::Simulation;
pub use summary::BatchSummary;
pub use viral_load::{ViralLoadCurve, ViralLoadModel, ViralLoadParameters, VIRAL_LOAD_HORIZON};
