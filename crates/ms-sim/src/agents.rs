//! Agent arena: one record per traced agent, grouped by population.

use std::collections::HashMap;

use ms_core::{AgentId, NodeId, VehicleId};
use ms_trace::Trace;

use crate::{SimError, SimResult};

/// Population names used by the builder.
pub mod population {
    pub const OPERATORS: &str = "operators";
    pub const VEHICLES:  &str = "vehicles";
    pub const STAFF:     &str = "staff";
    pub const STATIONS:  &str = "stations";
    pub const UNITS:     &str = "units";
    pub const RIDERS:    &str = "riders";
}

/// Shared state of one agent, whatever its role.
#[derive(Debug)]
pub struct AgentRecord {
    pub id:         AgentId,
    pub name:       String,
    pub population: String,
    pub position:   NodeId,
    /// Service vehicle currently carrying the agent.
    pub vehicle:    Option<VehicleId>,
    pub trace:      Trace,
    pub left:       bool,
}

/// Dense `AgentId → AgentRecord` arena plus the population index.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    records:     Vec<AgentRecord>,
    populations: HashMap<String, Vec<AgentId>>,
    by_name:     HashMap<String, AgentId>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent.  Names are unique across populations.
    pub fn add(
        &mut self,
        name:       impl Into<String>,
        population: &str,
        position:   NodeId,
    ) -> SimResult<AgentId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(SimError::config(format!("duplicate agent name '{name}'")));
        }
        let id = AgentId(self.records.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.populations.entry(population.to_owned()).or_default().push(id);
        self.records.push(AgentRecord {
            id,
            name,
            population: population.to_owned(),
            position,
            vehicle:    None,
            trace:      Trace::new(),
            left:       false,
        });
        Ok(id)
    }

    pub fn get(&self, id: AgentId) -> SimResult<&AgentRecord> {
        self.records.get(id.index()).ok_or(SimError::UnknownAgent(id))
    }

    pub fn get_mut(&mut self, id: AgentId) -> SimResult<&mut AgentRecord> {
        self.records.get_mut(id.index()).ok_or(SimError::UnknownAgent(id))
    }

    pub fn find(&self, name: &str) -> Option<AgentId> {
        self.by_name.get(name).copied()
    }

    /// Members of `population`, in registration order.
    pub fn population(&self, population: &str) -> &[AgentId] {
        self.populations.get(population).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentRecord> {
        self.records.iter()
    }
}
