//! Pieces shared by the three compartments.
use indexmap::IndexSet;
use serde::Serialize;

use crate::agent::{AgentId, Flag};
use crate::agent_store::AgentStore;
use crate::error::SimError;

/// A set of agents moving between compartments, or a compartment's membership.
///
/// Iteration follows insertion order, which keeps every random draw that walks a cohort
/// reproducible under a fixed seed.
pub type Cohort = IndexSet<AgentId>;

/// Inserts every agent of `incoming` into `members`.
///
/// # Errors
///
/// Returns `SimError::InvariantViolation` if an agent is already a member; `members` is left
/// unchanged in that case.
pub(crate) fn insert_all(
    compartment: &str,
    members: &mut Cohort,
    incoming: &Cohort,
) -> Result<(), SimError> {
    if let Some(agent_id) = incoming.iter().find(|agent_id| members.contains(*agent_id)) {
        return Err(SimError::InvariantViolation(format!(
            "agent {agent_id} admitted to {compartment} twice"
        )));
    }
    members.extend(incoming.iter().copied());
    Ok(())
}

/// Joins two cohorts in flight on the same day.
///
/// # Errors
///
/// Returns `SimError::InvariantViolation` if an agent appears in both.
pub(crate) fn merge_disjoint(first: Cohort, second: &Cohort) -> Result<Cohort, SimError> {
    let mut merged = first;
    for agent_id in second {
        if !merged.insert(*agent_id) {
            return Err(SimError::InvariantViolation(format!(
                "agent {agent_id} is leaving two places at once"
            )));
        }
    }
    Ok(merged)
}

/// Removes and returns the members for which `detach` holds, preserving order on both sides.
pub(crate) fn detach_where(
    members: &mut Cohort,
    mut detach: impl FnMut(AgentId) -> bool,
) -> Cohort {
    let mut detached = Cohort::new();
    members.retain(|agent_id| {
        if detach(*agent_id) {
            detached.insert(*agent_id);
            false
        } else {
            true
        }
    });
    detached
}

/// The per-day occupancy logs kept by quarantine and isolation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompartmentLog {
    pub total: Vec<usize>,
    pub using_resources: Vec<usize>,
}

impl CompartmentLog {
    /// Appends today's membership size and the number of members with `resource_flag` set.
    pub(crate) fn record(&mut self, store: &AgentStore, members: &Cohort, resource_flag: Flag) {
        self.total.push(members.len());
        self.using_resources.push(
            members
                .iter()
                .filter(|agent_id| store.get(**agent_id).flag(resource_flag))
                .count(),
        );
    }

    /// Number of days logged.
    pub fn len(&self) -> usize {
        self.total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::agent::{Agent, AgentUpdate};
    use crate::viral_load::ViralLoadCurve;

    fn cohort(ids: &[usize]) -> Cohort {
        ids.iter().map(|id| AgentId(*id)).collect()
    }

    #[test]
    fn insert_all_rejects_duplicates() {
        let mut members = cohort(&[0, 1]);
        insert_all("quarantine", &mut members, &cohort(&[2, 3])).unwrap();
        assert_eq!(members, cohort(&[0, 1, 2, 3]));

        let err = insert_all("quarantine", &mut members, &cohort(&[4, 1])).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation(_)));
        assert_eq!(members.len(), 4);
    }

    #[test]
    fn merge_disjoint_detects_overlap() {
        let merged = merge_disjoint(cohort(&[3, 1]), &cohort(&[2])).unwrap();
        assert_eq!(
            merged.into_iter().collect::<Vec<_>>(),
            cohort(&[3, 1, 2]).into_iter().collect::<Vec<_>>()
        );
        assert!(matches!(
            merge_disjoint(cohort(&[3, 1]), &cohort(&[1])),
            Err(SimError::InvariantViolation(_))
        ));
    }

    #[test]
    fn detach_where_preserves_order() {
        let mut members = cohort(&[5, 2, 8, 1, 4]);
        let detached = detach_where(&mut members, |agent_id| agent_id.id() % 2 == 0);
        assert_eq!(
            detached.iter().copied().collect::<Vec<_>>(),
            cohort(&[2, 8, 4]).into_iter().collect::<Vec<_>>()
        );
        assert_eq!(
            members.iter().copied().collect::<Vec<_>>(),
            cohort(&[5, 1]).into_iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn log_records_total_and_resources() {
        let mut store = AgentStore::new();
        let members: Cohort = [true, false, true]
            .iter()
            .map(|using| {
                store.add(Agent::new(
                    ViralLoadCurve::default(),
                    &AgentUpdate::new().using_isolation_resources(*using),
                ))
            })
            .collect();
        let mut log = CompartmentLog::default();
        assert!(log.is_empty());
        log.record(&store, &members, Flag::UsingIsolationResources);
        log.record(&store, &Cohort::new(), Flag::UsingIsolationResources);
        assert_eq!(log.total, vec![3, 0]);
        assert_eq!(log.using_resources, vec![2, 0]);
        assert_eq!(log.len(), 2);
    }
}
