//! Confirmed cases serving a fixed isolation stay.
use log::{debug, trace};

use crate::agent::{AgentUpdate, Flag, Timer};
use crate::agent_store::AgentStore;
use crate::compartment::{detach_where, insert_all, Cohort, CompartmentLog};
use crate::error::SimError;
use crate::parameters::Parameters;
use crate::query::{self, AgentPredicate};
use crate::random::SimRng;

#[derive(Debug, Clone)]
pub struct Isolation {
    members: Cohort,
    log: CompartmentLog,
    days_in_isolation: i32,
    eligible_for_retesting: bool,
    probability_using_isolation_resources: f64,
}

impl Isolation {
    /// Creates an empty isolation and logs its initial state.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ParameterError` if the isolation parameters are invalid.
    pub fn new(parameters: &Parameters, store: &AgentStore) -> Result<Isolation, SimError> {
        let config = &parameters.isolation;
        config.validate()?;
        let days_in_isolation = i32::try_from(config.days_in_isolation).map_err(|_| {
            SimError::ParameterError(format!(
                "days_in_isolation is too large: {}",
                config.days_in_isolation
            ))
        })?;
        let mut isolation = Isolation {
            members: Cohort::new(),
            log: CompartmentLog::default(),
            days_in_isolation,
            eligible_for_retesting: config.eligible_for_retesting,
            probability_using_isolation_resources: config.probability_using_isolation_resources,
        };
        isolation.log_state(store);
        Ok(isolation)
    }

    pub fn members(&self) -> &Cohort {
        &self.members
    }

    pub fn log(&self) -> &CompartmentLog {
        &self.log
    }

    pub fn fetch_subpopulation<P>(&self, store: &AgentStore, predicate: &P) -> Cohort
    where
        P: AgentPredicate + ?Sized,
    {
        query::fetch_subpopulation(store, predicate, &self.members)
    }

    /// Starts a full isolation stay for every agent in `agents`. Their infection is considered
    /// resolved, and any pending test result or scheduled quarantine is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvariantViolation` if an agent is already isolated.
    pub fn admit_to_isolation(
        &mut self,
        store: &mut AgentStore,
        rng: &mut SimRng,
        agents: &Cohort,
    ) -> Result<(), SimError> {
        insert_all("isolation", &mut self.members, agents)?;
        let admission = AgentUpdate::new()
            .infected(false)
            .infectious(false)
            .detectable(false)
            .recovered(true)
            .testable(self.eligible_for_retesting)
            .awaiting_results(false)
            .days_till_results(0)
            .to_be_isolated(false)
            .to_be_quarantined(false)
            .days_till_quarantine(0)
            .isolation_timer(self.days_in_isolation)
            .ever_isolated(true);
        for agent_id in agents {
            let using_resources = rng.sample_bool(self.probability_using_isolation_resources);
            store
                .get_mut(*agent_id)
                .apply(&admission.using_isolation_resources(using_resources));
        }
        trace!("admitted {} agents to isolation", agents.len());
        Ok(())
    }

    /// Counts every stay down by one day and discharges the members whose stay is over. An
    /// agent admitted with a stay of `D` days is discharged by the `D`-th call.
    pub fn progress_isolation(&mut self, store: &mut AgentStore) -> Cohort {
        for agent_id in &self.members {
            store
                .get_mut(*agent_id)
                .increment_timer(Timer::Isolation, -1);
        }
        let discharged = detach_where(&mut self.members, |agent_id| {
            store.get(agent_id).isolation_timer == 0
        });
        for agent_id in &discharged {
            store
                .get_mut(*agent_id)
                .apply(&AgentUpdate::new().using_isolation_resources(false));
        }
        if !discharged.is_empty() {
            debug!("isolation discharged {} agents", discharged.len());
        }
        discharged
    }

    /// Appends today's total and resource-using counts.
    pub fn log_state(&mut self, store: &AgentStore) {
        self.log
            .record(store, &self.members, Flag::UsingIsolationResources);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::agent::{Agent, AgentId};
    use crate::query::AgentQuery;
    use crate::viral_load::ViralLoadCurve;

    fn setup(parameters: &Parameters, agents: Vec<Agent>) -> (Isolation, AgentStore, Cohort) {
        let mut store = AgentStore::new();
        let ids = agents.into_iter().map(|agent| store.add(agent)).collect();
        let isolation = Isolation::new(parameters, &store).unwrap();
        (isolation, store, ids)
    }

    fn confirmed_case() -> Agent {
        Agent::new(
            ViralLoadCurve::default(),
            &AgentUpdate::new()
                .infected(true)
                .infectious(true)
                .detectable(true)
                .testable(true)
                .awaiting_results(true)
                .to_be_isolated(true)
                .to_be_quarantined(true)
                .days_till_quarantine(2),
        )
    }

    #[test]
    fn zero_day_stay_is_rejected() {
        let mut parameters = Parameters::default();
        parameters.isolation.days_in_isolation = 0;
        assert!(matches!(
            Isolation::new(&parameters, &AgentStore::new()),
            Err(SimError::ParameterError(_))
        ));
    }

    #[test]
    fn admission_resets_case_state() {
        let (mut isolation, mut store, ids) = setup(&Parameters::default(), vec![confirmed_case()]);
        isolation
            .admit_to_isolation(&mut store, &mut SimRng::new(3), &ids)
            .unwrap();
        let agent = store.get(AgentId(0));
        assert!(!agent.infected);
        assert!(!agent.infectious);
        assert!(!agent.detectable);
        assert!(agent.recovered);
        assert!(!agent.testable);
        assert!(!agent.awaiting_results);
        assert!(!agent.to_be_isolated);
        assert!(!agent.to_be_quarantined);
        assert_eq!(agent.days_till_quarantine, 0);
        assert_eq!(agent.isolation_timer, 8);
        assert!(agent.ever_isolated);
    }

    #[test]
    fn retesting_policy_sets_testable() {
        let mut parameters = Parameters::default();
        parameters.isolation.eligible_for_retesting = true;
        let (mut isolation, mut store, ids) = setup(&parameters, vec![confirmed_case()]);
        isolation
            .admit_to_isolation(&mut store, &mut SimRng::new(3), &ids)
            .unwrap();
        assert!(store.get(AgentId(0)).testable);
    }

    #[test]
    fn discharged_on_exactly_the_last_day() {
        for days in [1, 2, 5, 8] {
            let mut parameters = Parameters::default();
            parameters.isolation.days_in_isolation = days;
            let (mut isolation, mut store, ids) = setup(&parameters, vec![confirmed_case()]);
            isolation
                .admit_to_isolation(&mut store, &mut SimRng::new(3), &ids)
                .unwrap();
            for _ in 1..days {
                assert!(isolation.progress_isolation(&mut store).is_empty());
            }
            let discharged = isolation.progress_isolation(&mut store);
            assert!(discharged.contains(&AgentId(0)));
            assert!(isolation.members().is_empty());
            assert!(!store.get(AgentId(0)).using_isolation_resources);
        }
    }

    #[test]
    fn resource_use_is_logged() {
        let mut parameters = Parameters::default();
        parameters.isolation.probability_using_isolation_resources = 0.0;
        let (mut isolation, mut store, ids) =
            setup(&parameters, vec![confirmed_case(), confirmed_case()]);
        isolation
            .admit_to_isolation(&mut store, &mut SimRng::new(3), &ids)
            .unwrap();
        isolation.log_state(&store);
        assert_eq!(isolation.log().total, vec![0, 2]);
        assert_eq!(isolation.log().using_resources, vec![0, 0]);
        let using = AgentQuery::new().with_flag(Flag::UsingIsolationResources, true);
        assert!(isolation.fetch_subpopulation(&store, &using).is_empty());
    }

    #[test]
    fn double_admission_is_an_invariant_violation() {
        let (mut isolation, mut store, ids) = setup(&Parameters::default(), vec![confirmed_case()]);
        let mut rng = SimRng::new(1);
        isolation.admit_to_isolation(&mut store, &mut rng, &ids).unwrap();
        assert!(matches!(
            isolation.admit_to_isolation(&mut store, &mut rng, &ids),
            Err(SimError::InvariantViolation(_))
        ));
    }
}
