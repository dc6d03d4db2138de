//! Traced contacts waiting out a quarantine stay, or waiting to be transferred to isolation.
//!
//! On admission every agent is classified:
//! * agents already holding a positive result that has not come back yet are transferred once it
//!   would have (at least one day later);
//! * infected agents whose load is still rising are transferred once they would have become
//!   detectable and their result come back;
//! * everyone else serves a full stay and is discharged back to the general population.
use log::{debug, trace};

use crate::agent::{Agent, AgentUpdate, Flag, Timer};
use crate::agent_store::AgentStore;
use crate::compartment::{detach_where, insert_all, Cohort, CompartmentLog};
use crate::distribution::DiscreteDistribution;
use crate::error::SimError;
use crate::parameters::Parameters;
use crate::query::{self, AgentPredicate};
use crate::random::SimRng;

#[derive(Debug, Clone)]
pub struct Quarantine {
    members: Cohort,
    log: CompartmentLog,
    days_in_quarantine: i32,
    detectable_threshold: f64,
    days_till_results_distribution: DiscreteDistribution,
    probability_using_quarantine_resources: f64,
}

/// The agents leaving quarantine on a given day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuarantineRelease {
    /// Bound for isolation.
    pub transferred: Cohort,
    /// Bound for the general population.
    pub discharged: Cohort,
}

impl Quarantine {
    /// Creates an empty quarantine and logs its initial state.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if the quarantine or population parameters are
    /// invalid, or the stay does not fit in an `i32` day count.
    pub fn new(parameters: &Parameters, store: &AgentStore) -> Result<Quarantine, SimError> {
        parameters.quarantine.validate()?;
        parameters.population.validate()?;
        let days_in_quarantine = i32::try_from(parameters.quarantine.days_in_quarantine)
            .map_err(|_| {
                SimError::ParameterError(format!(
                    "days_in_quarantine is too large: {}",
                    parameters.quarantine.days_in_quarantine
                ))
            })?;
        let mut quarantine = Quarantine {
            members: Cohort::new(),
            log: CompartmentLog::default(),
            days_in_quarantine,
            detectable_threshold: parameters.population.detectable_threshold,
            days_till_results_distribution: parameters
                .population
                .days_till_results_distribution
                .clone(),
            probability_using_quarantine_resources: parameters
                .quarantine
                .probability_using_quarantine_resources,
        };
        quarantine.log_state(store);
        Ok(quarantine)
    }

    pub fn members(&self) -> &Cohort {
        &self.members
    }

    pub fn log(&self) -> &CompartmentLog {
        &self.log
    }

    /// Returns the members matching `predicate`, in membership order.
    pub fn fetch_subpopulation<P>(&self, store: &AgentStore, predicate: &P) -> Cohort
    where
        P: AgentPredicate + ?Sized,
    {
        query::fetch_subpopulation(store, predicate, &self.members)
    }

    /// Admits `agents`, draws their resource use (in admission order), then classifies each one
    /// and sets its timers.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvariantViolation` if an agent is already in quarantine.
    pub fn admit_to_quarantine(
        &mut self,
        store: &mut AgentStore,
        rng: &mut SimRng,
        agents: &Cohort,
    ) -> Result<(), SimError> {
        insert_all("quarantine", &mut self.members, agents)?;

        for agent_id in agents {
            let using_resources = rng.sample_bool(self.probability_using_quarantine_resources);
            store
                .get_mut(*agent_id)
                .apply(&AgentUpdate::new().using_quarantine_resources(using_resources));
        }

        let mut transfers = 0;
        for agent_id in agents {
            let agent = store.get_mut(*agent_id);
            let mut update = AgentUpdate::new()
                .testable(true)
                .to_be_quarantined(false)
                .days_till_quarantine(0)
                .quarantine_timer(self.days_in_quarantine)
                .ever_quarantined(true)
                .awaiting_results(false)
                .days_till_results(0)
                .to_be_transferred(false)
                .days_till_transfer(0);

            if agent.to_be_isolated {
                update = transfer(update, agent.days_till_results.max(1));
                transfers += 1;
            } else if agent.infected {
                match self.days_till_detected(agent, rng) {
                    Some(days_till_transfer) => {
                        update = transfer(update, days_till_transfer);
                        transfers += 1;
                    }
                    None => {
                        update = update
                            .infected(false)
                            .infectious(false)
                            .detectable(false)
                            .recovered(true);
                    }
                }
            }
            agent.apply(&update);
        }

        trace!(
            "admitted {} agents to quarantine, {transfers} awaiting transfer",
            agents.len()
        );
        Ok(())
    }

    /// Days until an infected agent would be detected and its result returned, or `None` if its
    /// viral load is no longer rising or never again exceeds the detectable threshold.
    fn days_till_detected(&self, agent: &Agent, rng: &mut SimRng) -> Option<i32> {
        let today = agent.infection_timer;
        let curve = &agent.viral_load_curve;
        if curve.at(today) <= curve.at(today - 1) {
            return None;
        }
        let first_detectable_day = curve.first_day_above(self.detectable_threshold, today)?;
        Some(first_detectable_day - today + self.days_till_results_distribution.sample(rng))
    }

    /// Releases members whose countdown ran out yesterday, then counts every remaining timer
    /// down by one day. Transfers are checked before discharges.
    pub fn progress_quarantine(&mut self, store: &mut AgentStore) -> QuarantineRelease {
        let transferred = detach_where(&mut self.members, |agent_id| {
            let agent = store.get(agent_id);
            agent.to_be_transferred && agent.days_till_transfer == 0
        });
        let discharged = detach_where(&mut self.members, |agent_id| {
            store.get(agent_id).quarantine_timer == 0
        });

        for agent_id in &self.members {
            let agent = store.get_mut(*agent_id);
            agent.increment_timer(Timer::Quarantine, -1);
            if agent.to_be_transferred {
                agent.increment_timer(Timer::DaysTillTransfer, -1);
            }
        }

        let release = AgentUpdate::new()
            .to_be_transferred(false)
            .days_till_transfer(0)
            .quarantine_timer(0)
            .using_quarantine_resources(false);
        for agent_id in transferred.iter().chain(&discharged) {
            store.get_mut(*agent_id).apply(&release);
        }

        if !transferred.is_empty() || !discharged.is_empty() {
            debug!(
                "quarantine released {} transfers and {} discharges",
                transferred.len(),
                discharged.len()
            );
        }
        QuarantineRelease {
            transferred,
            discharged,
        }
    }

    /// Appends today's total and resource-using counts.
    pub fn log_state(&mut self, store: &AgentStore) {
        self.log
            .record(store, &self.members, Flag::UsingQuarantineResources);
    }
}

// Marks an admission for transfer to isolation after `days_till_transfer` days. Its infection is
// considered handled from here on, even if the stay ends before the transfer.
fn transfer(update: AgentUpdate, days_till_transfer: i32) -> AgentUpdate {
    update
        .to_be_transferred(true)
        .days_till_transfer(days_till_transfer)
        .infected(false)
        .infectious(false)
        .detectable(false)
        .recovered(true)
}
