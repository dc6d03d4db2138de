//! A single run: one agent population moving through the three compartments, one day at a time.
//!
//! Each call to [`Simulation::step`] performs the same fixed sequence:
//!
//! 1. the population progresses infections,
//! 2. exposes susceptible agents,
//! 3. tests eligible agents,
//! 4. and resolves pending results, yielding the agents bound for isolation;
//! 5. contacts are traced in proportion to the number of new cases, yielding the agents bound
//!    for quarantine;
//! 6. quarantine admits them
//! 7. and then releases transfers and discharges;
//! 8. isolation releases its discharges;
//! 9. isolation admits the new cases and the quarantine transfers;
//! 10. the population takes back everyone discharged;
//! 11. every compartment logs its counts.
//!
//! Every cohort moved in steps 9 and 10 is collected before either admission happens. After the
//! step the bookkeeping invariants are checked, and a violation aborts the run.
use log::{debug, trace};

use crate::agent::Agent;
use crate::agent_store::AgentStore;
use crate::compartment::{merge_disjoint, Cohort};
use crate::error::SimError;
use crate::general_population::GeneralPopulation;
use crate::isolation::Isolation;
use crate::parameters::Parameters;
use crate::quarantine::{Quarantine, QuarantineRelease};
use crate::random::SimRng;
use crate::report::RunResults;
use crate::viral_load::ViralLoadModel;

pub struct Simulation {
    parameters: Parameters,
    store: AgentStore,
    rng: SimRng,
    population: GeneralPopulation,
    quarantine: Quarantine,
    isolation: Isolation,
    day: usize,
}

impl Simulation {
    /// Builds the initial population described by `parameters`, with all randomness drawn from
    /// a generator seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if `parameters` fail validation.
    pub fn new(parameters: Parameters, seed: u64) -> Result<Simulation, SimError> {
        parameters.validate()?;
        let mut rng = SimRng::new(seed);
        let viral_load_model = ViralLoadModel::new(&parameters.viral_load)?;
        let mut store = AgentStore::new();
        let population =
            GeneralPopulation::new(&parameters, &viral_load_model, &mut store, &mut rng)?;
        Simulation::assemble(parameters, store, rng, population)
    }

    /// Starts a run from hand-built agents, all placed in the general population with their
    /// state untouched. The population parameters' initial sizes are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if `parameters` fail validation.
    pub fn from_agents(
        parameters: Parameters,
        agents: Vec<Agent>,
        seed: u64,
    ) -> Result<Simulation, SimError> {
        parameters.validate()?;
        let mut store = AgentStore::new();
        let members: Cohort = agents.into_iter().map(|agent| store.add(agent)).collect();
        let population = GeneralPopulation::from_members(&parameters, &store, members)?;
        Simulation::assemble(parameters, store, SimRng::new(seed), population)
    }

    fn assemble(
        parameters: Parameters,
        store: AgentStore,
        rng: SimRng,
        population: GeneralPopulation,
    ) -> Result<Simulation, SimError> {
        let quarantine = Quarantine::new(&parameters, &store)?;
        let isolation = Isolation::new(&parameters, &store)?;
        let simulation = Simulation {
            parameters,
            store,
            rng,
            population,
            quarantine,
            isolation,
            day: 0,
        };
        simulation.check_invariants()?;
        debug!(
            "simulation created with {} agents (seed={})",
            simulation.store.len(),
            simulation.rng.base_seed()
        );
        Ok(simulation)
    }

    /// Advances the simulation by one day.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvariantViolation` if the compartment bookkeeping is inconsistent at
    /// any point of the day. The simulation must not be stepped again after an error.
    pub fn step(&mut self) -> Result<(), SimError> {
        let Simulation {
            store,
            rng,
            population,
            quarantine,
            isolation,
            ..
        } = self;

        population.progress_infection(store);
        population.infect_susceptible(store, rng);
        population.test_population(store, rng);
        let isolation_bound = population.progress_test_results(store);
        let quarantine_bound = population.trace_contacts(store, rng, isolation_bound.len());

        quarantine.admit_to_quarantine(store, rng, &quarantine_bound)?;
        let QuarantineRelease {
            transferred,
            discharged: quarantine_discharged,
        } = quarantine.progress_quarantine(store);
        let isolation_discharged = isolation.progress_isolation(store);

        let admitted_to_isolation = merge_disjoint(isolation_bound, &transferred)?;
        let returning = merge_disjoint(quarantine_discharged, &isolation_discharged)?;
        isolation.admit_to_isolation(store, rng, &admitted_to_isolation)?;
        population.add_to_population(&returning)?;

        population.log_state(store);
        quarantine.log_state(store);
        isolation.log_state(store);

        self.day += 1;
        trace!(
            "day {}: {} isolated, {} quarantined, {} returned",
            self.day,
            admitted_to_isolation.len(),
            quarantine_bound.len(),
            returning.len()
        );
        self.check_invariants()?;
        debug!(
            "day {}: population {}, quarantine {}, isolation {}",
            self.day,
            self.population.members().len(),
            self.quarantine.members().len(),
            self.isolation.members().len()
        );
        Ok(())
    }

    /// Performs `num_days` day-steps.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by [`Simulation::step`].
    pub fn run(&mut self, num_days: usize) -> Result<(), SimError> {
        for _ in 0..num_days {
            self.step()?;
        }
        Ok(())
    }

    /// Checks that every agent is in exactly one compartment and that no agent is both
    /// susceptible and infected.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvariantViolation` describing the first inconsistency found.
    pub fn check_invariants(&self) -> Result<(), SimError> {
        let mut placement: Vec<Option<&str>> = vec![None; self.store.len()];
        for (name, members) in [
            ("the general population", self.population.members()),
            ("quarantine", self.quarantine.members()),
            ("isolation", self.isolation.members()),
        ] {
            for agent_id in members {
                if !self.store.contains(*agent_id) {
                    return Err(SimError::InvariantViolation(format!(
                        "unknown agent {agent_id} in {name}"
                    )));
                }
                if let Some(other) = placement[agent_id.id()].replace(name) {
                    return Err(SimError::InvariantViolation(format!(
                        "agent {agent_id} is in both {other} and {name}"
                    )));
                }
            }
        }
        if let Some(missing) = placement.iter().position(Option::is_none) {
            return Err(SimError::InvariantViolation(format!(
                "agent {missing} is in no compartment"
            )));
        }
        if let Some((agent_id, _)) = self
            .store
            .iter()
            .find(|(_, agent)| agent.susceptible && agent.infected)
        {
            return Err(SimError::InvariantViolation(format!(
                "agent {agent_id} is both susceptible and infected"
            )));
        }
        Ok(())
    }

    /// Number of day-steps performed so far.
    pub fn day(&self) -> usize {
        self.day
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    pub fn population(&self) -> &GeneralPopulation {
        &self.population
    }

    pub fn quarantine(&self) -> &Quarantine {
        &self.quarantine
    }

    pub fn isolation(&self) -> &Isolation {
        &self.isolation
    }

    /// The per-day series logged so far, including the initial state.
    pub fn results(&self) -> RunResults {
        RunResults::new(
            self.population.log(),
            self.quarantine.log(),
            self.isolation.log(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::agent::{AgentId, AgentUpdate};
    use crate::distribution::DiscreteDistribution;
    use crate::viral_load::{ViralLoadCurve, VIRAL_LOAD_HORIZON};

    fn small_parameters() -> Parameters {
        let mut parameters = Parameters::default();
        parameters.population.num_susceptible = 190;
        parameters.population.num_infected = 10;
        parameters
    }

    #[test]
    fn invalid_parameters_fail_before_any_step() {
        let mut parameters = small_parameters();
        parameters.population.infectious_threshold = f64::INFINITY;
        assert!(matches!(
            Simulation::new(parameters, 1),
            Err(SimError::ParameterError(_))
        ));
    }

    #[test]
    fn logs_grow_by_one_per_day() {
        let mut simulation = Simulation::new(small_parameters(), 42).unwrap();
        assert_eq!(simulation.results().len(), 1);
        simulation.run(10).unwrap();
        assert_eq!(simulation.day(), 10);
        assert_eq!(simulation.results().len(), 11);
        assert_eq!(simulation.population().log().len(), 11);
        assert_eq!(simulation.quarantine().log().len(), 11);
        assert_eq!(simulation.isolation().log().len(), 11);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut first = Simulation::new(small_parameters(), 7).unwrap();
        let mut second = Simulation::new(small_parameters(), 7).unwrap();
        first.run(30).unwrap();
        second.run(30).unwrap();
        assert_eq!(first.results(), second.results());
    }

    #[test]
    fn invariant_check_catches_dual_state() {
        let agent = Agent::new(
            ViralLoadCurve::default(),
            &AgentUpdate::new().susceptible(true).infected(true),
        );
        let result = Simulation::from_agents(Parameters::default(), vec![agent], 1);
        assert!(matches!(result, Err(SimError::InvariantViolation(_))));
    }

    #[test]
    fn positive_case_moves_to_isolation_the_same_day() {
        let mut parameters = Parameters::default();
        parameters.population.proportion_tested_daily = 1.0;
        parameters.population.detectable_threshold = 0.0;
        parameters.population.days_till_results_distribution =
            DiscreteDistribution::point_mass(0).unwrap();
        let agent = Agent::new(
            ViralLoadCurve::from_values([8.0; VIRAL_LOAD_HORIZON]).unwrap(),
            &AgentUpdate::new()
                .infected(true)
                .testable(true)
                .infection_timer(5),
        );
        let mut simulation = Simulation::from_agents(parameters, vec![agent], 3).unwrap();
        simulation.step().unwrap();

        assert!(simulation.isolation().members().contains(&AgentId(0)));
        assert!(simulation.population().members().is_empty());
        assert!(simulation.store().get(AgentId(0)).ever_isolated);
        assert_eq!(simulation.isolation().log().total, vec![0, 1]);
    }
}
