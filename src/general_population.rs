//! The free-living population: infection progression, transmission, testing and contact tracing.
//!
//! Agents leave the general population when a positive result comes back (bound for isolation)
//! or when a scheduled quarantine starts (bound for quarantine), and return when discharged.
use log::{debug, trace};
use serde::Serialize;

use crate::agent::{Agent, AgentId, AgentUpdate, Flag, Timer};
use crate::agent_store::AgentStore;
use crate::compartment::{detach_where, insert_all, Cohort};
use crate::distribution::DiscreteDistribution;
use crate::error::SimError;
use crate::parameters::{Parameters, PopulationParameters};
use crate::query::{self, AgentPredicate, AgentQuery};
use crate::random::{
    sample_multiple_from_known_length, sample_multiple_with_replacement, SimRng,
};
use crate::viral_load::ViralLoadModel;

/// Per-day counts of the general population.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationLog {
    pub susceptible: Vec<usize>,
    pub infected: Vec<usize>,
    pub infectious: Vec<usize>,
    pub recovered: Vec<usize>,
}

impl PopulationLog {
    /// Number of days logged.
    pub fn len(&self) -> usize {
        self.susceptible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.susceptible.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct GeneralPopulation {
    members: Cohort,
    log: PopulationLog,
    config: PopulationParameters,
    days_till_quarantine_distribution: DiscreteDistribution,
    probability_successful_contact: f64,
}

impl GeneralPopulation {
    /// Creates the configured susceptible and infected agents in `store` and makes them the
    /// initial membership.
    ///
    /// Every agent gets a fresh viral-load curve. Initially infected agents then draw their
    /// infection age, shifted one day earlier so that offset 0 means "infected yesterday". One
    /// progression pass sets their derived flags before the initial counts are logged.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if the population or quarantine parameters are
    /// invalid.
    pub fn new(
        parameters: &Parameters,
        viral_load_model: &ViralLoadModel,
        store: &mut AgentStore,
        rng: &mut SimRng,
    ) -> Result<GeneralPopulation, SimError> {
        let config = &parameters.population;
        let mut members = Cohort::with_capacity(config.population_size());

        for _ in 0..config.num_susceptible {
            let curve = viral_load_model.generate(rng);
            members.insert(store.add(Agent::new(
                curve,
                &AgentUpdate::new().susceptible(true).testable(true),
            )));
        }

        let mut infected = Cohort::with_capacity(config.num_infected);
        for _ in 0..config.num_infected {
            let curve = viral_load_model.generate(rng);
            infected.insert(store.add(Agent::new(
                curve,
                &AgentUpdate::new()
                    .infected(true)
                    .ever_infected(true)
                    .testable(true),
            )));
        }
        for agent_id in &infected {
            let days_infected = config.initial_infection_distribution.sample(rng) - 1;
            store
                .get_mut(*agent_id)
                .apply(&AgentUpdate::new().infection_timer(days_infected));
        }
        members.extend(infected);

        let mut population = GeneralPopulation::from_members(parameters, store, members)?;
        population.progress_infection(store);
        population.log = PopulationLog::default();
        population.log_state(store);
        Ok(population)
    }

    /// Wraps agents already in `store` as the general population, leaving their state as is,
    /// and logs the initial counts.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if the population or quarantine parameters are
    /// invalid.
    pub fn from_members(
        parameters: &Parameters,
        store: &AgentStore,
        members: Cohort,
    ) -> Result<GeneralPopulation, SimError> {
        parameters.population.validate()?;
        parameters.quarantine.validate()?;
        let mut population = GeneralPopulation {
            members,
            log: PopulationLog::default(),
            config: parameters.population.clone(),
            days_till_quarantine_distribution: parameters
                .quarantine
                .days_till_quarantine_distribution
                .clone(),
            probability_successful_contact: parameters.quarantine.probability_successful_contact,
        };
        population.log_state(store);
        debug!(
            "general population initialized with {} agents",
            population.members.len()
        );
        Ok(population)
    }

    pub fn members(&self) -> &Cohort {
        &self.members
    }

    pub fn log(&self) -> &PopulationLog {
        &self.log
    }

    /// Returns the members matching `predicate`, in membership order.
    pub fn fetch_subpopulation<P>(&self, store: &AgentStore, predicate: &P) -> Cohort
    where
        P: AgentPredicate + ?Sized,
    {
        query::fetch_subpopulation(store, predicate, &self.members)
    }

    fn count<P>(&self, store: &AgentStore, predicate: &P) -> usize
    where
        P: AgentPredicate + ?Sized,
    {
        query::count_subpopulation(store, predicate, &self.members)
    }

    /// Advances every infected member by one day along its viral-load curve and refreshes the
    /// derived flags. An agent whose load drops to zero from a positive value recovers.
    pub fn progress_infection(&mut self, store: &mut AgentStore) {
        let infected =
            self.fetch_subpopulation(store, &AgentQuery::new().with_flag(Flag::Infected, true));
        let mut recoveries = 0;
        for agent_id in &infected {
            let agent = store.get_mut(*agent_id);
            let previous_viral_load = agent.viral_load;
            agent.increment_timer(Timer::Infection, 1);
            let viral_load = agent.viral_load_curve.at(agent.infection_timer);

            let mut update = AgentUpdate::new()
                .viral_load(viral_load)
                .infectious(viral_load >= self.config.infectious_threshold)
                .detectable(viral_load >= self.config.detectable_threshold);
            if viral_load <= 0.0 && previous_viral_load > viral_load {
                update = update.infected(false).recovered(true);
                recoveries += 1;
            }
            agent.apply(&update);
        }
        trace!(
            "progressed {} infections, {recoveries} recovered",
            infected.len()
        );
    }

    /// Exposes susceptible members to infectious contacts and to background infection.
    ///
    /// Draw order: one contacts-per-day draw per infectious member, the contacted members
    /// (uniformly, with replacement), one transmission trial per distinct susceptible contact,
    /// one background trial per susceptible member not contacted, and finally one more
    /// background trial per member still susceptible.
    pub fn infect_susceptible(&mut self, store: &mut AgentStore, rng: &mut SimRng) {
        let is_susceptible = AgentQuery::new().with_flag(Flag::Susceptible, true);
        if self.count(store, &is_susceptible) == 0 {
            return;
        }

        let num_infectious =
            self.count(store, &AgentQuery::new().with_flag(Flag::Infectious, true));
        let num_contacts = self
            .config
            .daily_contacts_distribution
            .sample_sum(rng, num_infectious);

        let pool: Vec<AgentId> = self.members.iter().copied().collect();
        let contacted: Cohort = rng
            .sample(|rng| sample_multiple_with_replacement(rng, &pool, num_contacts))
            .into_iter()
            .collect();

        let mut newly_infected = 0;
        let susceptible_contacts =
            query::fetch_subpopulation(store, &is_susceptible, &contacted);
        for agent_id in &susceptible_contacts {
            if rng.sample_bool(self.config.probability_infection_given_contact) {
                infect(store.get_mut(*agent_id));
                newly_infected += 1;
            }
        }

        let not_contacted: Cohort = self
            .members
            .iter()
            .filter(|agent_id| !contacted.contains(*agent_id))
            .copied()
            .collect();
        for agent_id in query::fetch_subpopulation(store, &is_susceptible, &not_contacted) {
            if rng.sample_bool(self.config.probability_outside_infection) {
                infect(store.get_mut(agent_id));
                newly_infected += 1;
            }
        }

        for agent_id in self.fetch_subpopulation(store, &is_susceptible) {
            if rng.sample_bool(self.config.probability_outside_infection) {
                infect(store.get_mut(agent_id));
                newly_infected += 1;
            }
        }

        trace!(
            "{num_infectious} infectious agents made {num_contacts} contacts, {newly_infected} new infections"
        );
    }

    /// Tests a random selection of eligible members (testable and not already awaiting a
    /// result). Agents that are currently detectable are flagged for isolation once their result
    /// comes back.
    pub fn test_population(&mut self, store: &mut AgentStore, rng: &mut SimRng) {
        let eligible = self.fetch_subpopulation(
            store,
            &AgentQuery::new()
                .with_flag(Flag::Testable, true)
                .with_flag(Flag::AwaitingResults, false),
        );
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let quota =
            (self.members.len() as f64 * self.config.proportion_tested_daily).floor() as usize;
        let num_tested = quota.min(eligible.len());

        let tested =
            rng.sample(|rng| sample_multiple_from_known_length(rng, eligible.iter(), num_tested));
        let mut positives = 0;
        for agent_id in tested {
            let days_till_results = self.config.days_till_results_distribution.sample(rng);
            let agent = store.get_mut(*agent_id);
            let mut update = AgentUpdate::new()
                .awaiting_results(true)
                .days_till_results(days_till_results);
            if agent.detectable {
                update = update.to_be_isolated(true);
                positives += 1;
            }
            agent.apply(&update);
        }
        trace!(
            "tested {num_tested} of {} eligible agents, {positives} positive",
            eligible.len()
        );
    }

    /// Resolves pending results. Returns (and removes from the population) every positive agent
    /// whose result arrives today; every other agent whose result arrives today becomes eligible
    /// for testing again. Remaining pending results move one day closer.
    pub fn progress_test_results(&mut self, store: &mut AgentStore) -> Cohort {
        let to_be_isolated = detach_where(&mut self.members, |agent_id| {
            let agent = store.get(agent_id);
            agent.to_be_isolated && agent.days_till_results == 0
        });

        for agent_id in self.fetch_subpopulation(
            store,
            &AgentQuery::new().with_timer(Timer::DaysTillResults, 0),
        ) {
            store
                .get_mut(agent_id)
                .apply(&AgentUpdate::new().awaiting_results(false));
        }

        for agent_id in self.fetch_subpopulation(
            store,
            &AgentQuery::new().with_flag(Flag::AwaitingResults, true),
        ) {
            store
                .get_mut(agent_id)
                .increment_timer(Timer::DaysTillResults, -1);
        }

        trace!("{} agents bound for isolation", to_be_isolated.len());
        to_be_isolated
    }

    /// Traces the contacts of `num_cases` newly confirmed cases, then starts the quarantine of
    /// every agent whose scheduled delay runs out today. Returns (and removes from the
    /// population) the agents entering quarantine.
    ///
    /// Contacts are drawn with replacement from the members that are testable and not yet
    /// scheduled, so the same agent may be reached twice; it is scheduled once with the later
    /// delay draw.
    pub fn trace_contacts(
        &mut self,
        store: &mut AgentStore,
        rng: &mut SimRng,
        num_cases: usize,
    ) -> Cohort {
        let eligible: Vec<AgentId> = self
            .fetch_subpopulation(
                store,
                &AgentQuery::new()
                    .with_flag(Flag::ToBeQuarantined, false)
                    .with_flag(Flag::Testable, true),
            )
            .into_iter()
            .collect();

        if !eligible.is_empty() {
            let num_contacts = self
                .config
                .daily_contacts_distribution
                .sample_sum(rng, num_cases);
            let num_reached =
                rng.count_successes(num_contacts, self.probability_successful_contact);
            let reached =
                rng.sample(|rng| sample_multiple_with_replacement(rng, &eligible, num_reached));
            for agent_id in reached {
                let days_till_quarantine = self.days_till_quarantine_distribution.sample(rng);
                store.get_mut(agent_id).apply(
                    &AgentUpdate::new()
                        .to_be_quarantined(true)
                        .days_till_quarantine(days_till_quarantine),
                );
            }
            trace!(
                "traced {num_contacts} contacts of {num_cases} cases, reached {num_reached}"
            );
        }

        for agent_id in self.fetch_subpopulation(
            store,
            &AgentQuery::new().with_flag(Flag::ToBeQuarantined, true),
        ) {
            store
                .get_mut(agent_id)
                .increment_timer(Timer::DaysTillQuarantine, -1);
        }

        let to_be_quarantined = detach_where(&mut self.members, |agent_id| {
            let agent = store.get(agent_id);
            agent.to_be_quarantined && agent.days_till_quarantine == 0
        });
        trace!("{} agents bound for quarantine", to_be_quarantined.len());
        to_be_quarantined
    }

    /// Returns discharged agents to the population without touching their state.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvariantViolation` if an agent is already a member.
    pub fn add_to_population(&mut self, agents: &Cohort) -> Result<(), SimError> {
        insert_all("the general population", &mut self.members, agents)?;
        trace!("{} agents returned to the general population", agents.len());
        Ok(())
    }

    /// Appends today's susceptible, infected, infectious and recovered counts.
    pub fn log_state(&mut self, store: &AgentStore) {
        let count_flag = |flag| self.count(store, &AgentQuery::new().with_flag(flag, true));
        let susceptible = count_flag(Flag::Susceptible);
        let infected = count_flag(Flag::Infected);
        let infectious = count_flag(Flag::Infectious);
        let recovered = count_flag(Flag::Recovered);
        self.log.susceptible.push(susceptible);
        self.log.infected.push(infected);
        self.log.infectious.push(infectious);
        self.log.recovered.push(recovered);
    }
}

fn infect(agent: &mut Agent) {
    agent.apply(
        &AgentUpdate::new()
            .susceptible(false)
            .infected(true)
            .infection_timer(0)
            .ever_infected(true),
    );
}
