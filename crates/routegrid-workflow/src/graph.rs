//! Workflow graph — validated adjacency sets over tenant-custom states.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use route_core::{StateId, StateRequirements, StopStatus, WorkflowState, WorkflowTransition};

/// Errors raised while building or mutating a workflow graph.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("self-transition on state {0} is illegal")]
    SelfTransition(StateId),

    #[error("terminal state {0} cannot have outgoing transitions")]
    TerminalOutgoing(StateId),

    #[error("more than one default state: {0} and {1}")]
    MultipleDefaults(StateId, StateId),

    #[error("transition references unknown state {0}")]
    UnknownState(StateId),

    #[error(
        "transition {from} -> {to} widens the core machine ({from_sys} -> {to_sys} is not a core edge)"
    )]
    WidensCoreMachine {
        from: StateId,
        to: StateId,
        from_sys: StopStatus,
        to_sys: StopStatus,
    },
}

/// A validated per-tenant workflow graph.
///
/// Built from stored states and transitions; all invariants hold once
/// construction succeeds. Lookups are O(1).
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    states: HashMap<StateId, WorkflowState>,
    /// Enabled custom edges as adjacency sets.
    edges: HashMap<StateId, HashSet<StateId>>,
    /// Enabled edges projected onto system states (already intersected
    /// with the core machine by the widening check).
    system_edges: HashSet<(StopStatus, StopStatus)>,
    default_state: Option<StateId>,
}

impl WorkflowGraph {
    /// Build and validate a graph. Disabled transitions are ignored.
    pub fn build(
        states: Vec<WorkflowState>,
        transitions: Vec<WorkflowTransition>,
    ) -> Result<Self, WorkflowError> {
        let mut state_map = HashMap::new();
        let mut default_state: Option<StateId> = None;
        for state in states {
            if state.is_default {
                if let Some(existing) = &default_state {
                    return Err(WorkflowError::MultipleDefaults(
                        existing.clone(),
                        state.id.clone(),
                    ));
                }
                default_state = Some(state.id.clone());
            }
            state_map.insert(state.id.clone(), state);
        }

        let mut edges: HashMap<StateId, HashSet<StateId>> = HashMap::new();
        let mut system_edges = HashSet::new();
        for t in transitions.into_iter().filter(|t| t.enabled) {
            if t.from_state_id == t.to_state_id {
                return Err(WorkflowError::SelfTransition(t.from_state_id));
            }
            let from = state_map
                .get(&t.from_state_id)
                .ok_or_else(|| WorkflowError::UnknownState(t.from_state_id.clone()))?;
            let to = state_map
                .get(&t.to_state_id)
                .ok_or_else(|| WorkflowError::UnknownState(t.to_state_id.clone()))?;
            if from.is_terminal {
                return Err(WorkflowError::TerminalOutgoing(from.id.clone()));
            }
            // Narrowing only: the system projection of every custom edge
            // must already be legal in the core machine.
            if !from.system_state.can_transition_to(to.system_state) {
                return Err(WorkflowError::WidensCoreMachine {
                    from: from.id.clone(),
                    to: to.id.clone(),
                    from_sys: from.system_state,
                    to_sys: to.system_state,
                });
            }
            system_edges.insert((from.system_state, to.system_state));
            edges
                .entry(t.from_state_id)
                .or_default()
                .insert(t.to_state_id);
        }

        Ok(Self {
            states: state_map,
            edges,
            system_edges,
            default_state,
        })
    }

    /// Is the custom-state edge `from -> to` currently legal?
    pub fn is_allowed(&self, from: &str, to: &str) -> bool {
        self.edges.get(from).is_some_and(|outs| outs.contains(to))
    }

    /// Is the system-state transition legal under this tenant's graph?
    pub fn system_allowed(&self, from: StopStatus, to: StopStatus) -> bool {
        self.system_edges.contains(&(from, to))
    }

    pub fn state(&self, id: &str) -> Option<&WorkflowState> {
        self.states.get(id)
    }

    pub fn default_state(&self) -> Option<&WorkflowState> {
        self.default_state.as_deref().and_then(|id| self.states.get(id))
    }

    /// Requirements to enter the given system state: the unique enabled
    /// custom state mapped onto it, or none when the mapping is absent or
    /// ambiguous.
    pub fn requirements_for_system(&self, system: StopStatus) -> Option<StateRequirements> {
        let mut found: Option<&WorkflowState> = None;
        for state in self.states.values() {
            if state.system_state == system {
                if found.is_some() {
                    return None;
                }
                found = Some(state);
            }
        }
        found.map(|s| s.requirements)
    }

    /// Seed graph for tenants with no customization: one state per system
    /// state, all core edges enabled.
    pub fn seed_defaults(tenant: &str) -> (Vec<WorkflowState>, Vec<WorkflowTransition>) {
        let state_id = |s: StopStatus| format!("sys-{}", s.to_string().to_lowercase());
        let states = StopStatus::all()
            .into_iter()
            .map(|s| WorkflowState {
                id: state_id(s),
                tenant_id: tenant.to_string(),
                label: s.to_string(),
                icon: None,
                system_state: s,
                is_terminal: s.is_terminal(),
                is_default: s == StopStatus::Pending,
                requirements: StateRequirements::default(),
            })
            .collect();
        let mut transitions = Vec::new();
        for from in StopStatus::all() {
            for to in StopStatus::all() {
                if from.can_transition_to(to) {
                    transitions.push(WorkflowTransition {
                        tenant_id: tenant.to_string(),
                        from_state_id: state_id(from),
                        to_state_id: state_id(to),
                        enabled: true,
                    });
                }
            }
        }
        (states, transitions)
    }
}
