//! Filtering agents by their flags and timers.
//!
//! A query is anything implementing [`AgentPredicate`]: either a typed [`AgentQuery`] (a
//! conjunction of exact flag/timer values) or a closure over `&Agent`.
use indexmap::IndexSet;

use crate::agent::{Agent, AgentId, Flag, Timer};
use crate::agent_store::AgentStore;

/// Checks that a given agent matches a query.
pub trait AgentPredicate {
    fn matches(&self, agent: &Agent) -> bool;
}

impl<F> AgentPredicate for F
where
    F: Fn(&Agent) -> bool,
{
    fn matches(&self, agent: &Agent) -> bool {
        self(agent)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Criterion {
    Flag(Flag, bool),
    Timer(Timer, i32),
}

/// A conjunction of exact-value criteria. The empty query matches every agent.
///
/// ```
/// use sirqis::agent::{Flag, Timer};
/// use sirqis::query::AgentQuery;
///
/// let ready_for_isolation = AgentQuery::new()
///     .with_flag(Flag::ToBeIsolated, true)
///     .with_timer(Timer::DaysTillResults, 0);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct AgentQuery {
    criteria: Vec<Criterion>,
}

impl AgentQuery {
    pub fn new() -> AgentQuery {
        AgentQuery::default()
    }

    pub fn with_flag(mut self, flag: Flag, value: bool) -> AgentQuery {
        self.criteria.push(Criterion::Flag(flag, value));
        self
    }

    pub fn with_timer(mut self, timer: Timer, value: i32) -> AgentQuery {
        self.criteria.push(Criterion::Timer(timer, value));
        self
    }
}

impl AgentPredicate for AgentQuery {
    fn matches(&self, agent: &Agent) -> bool {
        self.criteria.iter().all(|criterion| match *criterion {
            Criterion::Flag(flag, value) => agent.flag(flag) == value,
            Criterion::Timer(timer, value) => agent.timer(timer) == value,
        })
    }
}

/// Returns the members of `source` matching `predicate`, in `source` order.
///
/// This is a read-only scan over `source`; calling it twice without intervening mutation
/// returns identical results.
pub fn fetch_subpopulation<'a, P, I>(
    store: &AgentStore,
    predicate: &P,
    source: I,
) -> IndexSet<AgentId>
where
    P: AgentPredicate + ?Sized,
    I: IntoIterator<Item = &'a AgentId>,
{
    source
        .into_iter()
        .copied()
        .filter(|agent_id| predicate.matches(store.get(*agent_id)))
        .collect()
}

/// Counts the members of `source` matching `predicate`.
pub fn count_subpopulation<'a, P, I>(store: &AgentStore, predicate: &P, source: I) -> usize
where
    P: AgentPredicate + ?Sized,
    I: IntoIterator<Item = &'a AgentId>,
{
    source
        .into_iter()
        .filter(|agent_id| predicate.matches(store.get(**agent_id)))
        .count()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::agent::AgentUpdate;
    use crate::viral_load::ViralLoadCurve;

    fn store_with(updates: &[AgentUpdate]) -> (AgentStore, IndexSet<AgentId>) {
        let mut store = AgentStore::new();
        let ids = updates
            .iter()
            .map(|update| store.add(Agent::new(ViralLoadCurve::default(), update)))
            .collect();
        (store, ids)
    }

    #[test]
    fn typed_query_matches_all_criteria() {
        let (store, ids) = store_with(&[
            AgentUpdate::new().testable(true),
            AgentUpdate::new().testable(true).awaiting_results(true),
            AgentUpdate::new(),
        ]);
        let query = AgentQuery::new()
            .with_flag(Flag::Testable, true)
            .with_flag(Flag::AwaitingResults, false);
        let result = fetch_subpopulation(&store, &query, &ids);
        assert_eq!(result.len(), 1);
        assert!(result.contains(&AgentId(0)));
    }

    #[test]
    fn timer_criteria_compare_exactly() {
        let (store, ids) = store_with(&[
            AgentUpdate::new().days_till_results(0),
            AgentUpdate::new().days_till_results(1),
            AgentUpdate::new().days_till_results(-1),
        ]);
        let query = AgentQuery::new().with_timer(Timer::DaysTillResults, 0);
        let result = fetch_subpopulation(&store, &query, &ids);
        assert_eq!(result.into_iter().collect::<Vec<_>>(), vec![AgentId(0)]);
    }

    #[test]
    fn empty_query_matches_everything() {
        let (store, ids) = store_with(&[AgentUpdate::new(), AgentUpdate::new().infected(true)]);
        assert_eq!(fetch_subpopulation(&store, &AgentQuery::new(), &ids), ids);
    }

    #[test]
    fn closures_are_predicates() {
        let (store, ids) = store_with(&[
            AgentUpdate::new().viral_load(2.0),
            AgentUpdate::new().viral_load(7.0),
        ]);
        let high_load = |agent: &Agent| agent.viral_load > 5.0;
        assert_eq!(count_subpopulation(&store, &high_load, &ids), 1);
    }

    #[test]
    fn source_restricts_the_scan() {
        let (store, ids) = store_with(&[
            AgentUpdate::new().susceptible(true),
            AgentUpdate::new().susceptible(true),
        ]);
        let only_second: IndexSet<AgentId> = ids.iter().skip(1).copied().collect();
        let query = AgentQuery::new().with_flag(Flag::Susceptible, true);
        assert_eq!(fetch_subpopulation(&store, &query, &only_second), only_second);
    }

    #[test]
    fn queries_are_pure() {
        let (store, ids) = store_with(&[
            AgentUpdate::new().infected(true),
            AgentUpdate::new().susceptible(true),
            AgentUpdate::new().infected(true),
        ]);
        let query = AgentQuery::new().with_flag(Flag::Infected, true);
        let first = fetch_subpopulation(&store, &query, &ids);
        let second = fetch_subpopulation(&store, &query, &ids);
        assert_eq!(first, second);
        assert_eq!(
            first.iter().copied().collect::<Vec<_>>(),
            second.iter().copied().collect::<Vec<_>>()
        );
    }
}
