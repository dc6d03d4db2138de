//! Central arena owning every agent of a run.
//!
//! Agents are created once, at population initialization, and never removed. Compartments refer
//! to agents only through [`AgentId`] handles, so moving an agent between compartments moves a
//! handle and never copies agent state.
use crate::agent::{Agent, AgentId};

#[derive(Debug, Clone, Default)]
pub struct AgentStore {
    agents: Vec<Agent>,
}

impl AgentStore {
    pub fn new() -> AgentStore {
        AgentStore::default()
    }

    /// Takes ownership of `agent` and returns its handle. Handles are dense, starting from 0.
    pub fn add(&mut self, agent: Agent) -> AgentId {
        let agent_id = AgentId(self.agents.len());
        self.agents.push(agent);
        agent_id
    }

    /// # Panics
    ///
    /// Panics if `agent_id` was issued by a different store.
    pub fn get(&self, agent_id: AgentId) -> &Agent {
        &self.agents[agent_id.0]
    }

    /// # Panics
    ///
    /// Panics if `agent_id` was issued by a different store.
    pub fn get_mut(&mut self, agent_id: AgentId) -> &mut Agent {
        &mut self.agents[agent_id.0]
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        agent_id.0 < self.agents.len()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> impl ExactSizeIterator<Item = AgentId> {
        (0..self.agents.len()).map(AgentId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents
            .iter()
            .enumerate()
            .map(|(index, agent)| (AgentId(index), agent))
    }
}
