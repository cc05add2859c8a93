//! Status enums and the fixed core stop state machine.
//!
//! Serialized in SCREAMING_SNAKE_CASE to match the external status
//! vocabulary shared with the solver and the dispatch clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a plan configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigStatus {
    Draft,
    Optimizing,
    Confirmed,
}

/// Lifecycle status of an optimization job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Terminal order statuses accept no further automatic changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// The five system states every route stop (and every tenant-custom
/// workflow state) maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StopStatus {
    /// COMPLETED, FAILED and SKIPPED absorb: no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StopStatus::Completed | StopStatus::Failed | StopStatus::Skipped
        )
    }

    /// The fixed core machine. Tenant workflow graphs may narrow this set
    /// of edges but can never widen it.
    ///
    /// ```text
    /// PENDING ──→ IN_PROGRESS ──→ COMPLETED
    ///    │             │    └───→ FAILED
    ///    └─────────────┴────────→ SKIPPED
    /// ```
    pub fn can_transition_to(&self, to: StopStatus) -> bool {
        use StopStatus::*;
        match (self, to) {
            (Pending, InProgress) => true,
            (Pending, Skipped) => true,
            (InProgress, Completed) => true,
            (InProgress, Failed) => true,
            (InProgress, Skipped) => true,
            _ => false,
        }
    }

    /// All five system states, in lifecycle order.
    pub fn all() -> [StopStatus; 5] {
        [
            StopStatus::Pending,
            StopStatus::InProgress,
            StopStatus::Completed,
            StopStatus::Failed,
            StopStatus::Skipped,
        ]
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopStatus::Pending => "PENDING",
            StopStatus::InProgress => "IN_PROGRESS",
            StopStatus::Completed => "COMPLETED",
            StopStatus::Failed => "FAILED",
            StopStatus::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// Optimization objective selected on a plan configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Objective {
    Distance,
    Time,
    #[default]
    Balanced,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_stop_states_have_no_edges() {
        for from in [StopStatus::Completed, StopStatus::Failed, StopStatus::Skipped] {
            assert!(from.is_terminal());
            for to in StopStatus::all() {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn self_transitions_are_illegal() {
        for s in StopStatus::all() {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn pending_cannot_jump_to_completed() {
        assert!(!StopStatus::Pending.can_transition_to(StopStatus::Completed));
        assert!(!StopStatus::Pending.can_transition_to(StopStatus::Failed));
    }

    #[test]
    fn happy_path_edges() {
        assert!(StopStatus::Pending.can_transition_to(StopStatus::InProgress));
        assert!(StopStatus::InProgress.can_transition_to(StopStatus::Completed));
        assert!(StopStatus::InProgress.can_transition_to(StopStatus::Failed));
        assert!(StopStatus::Pending.can_transition_to(StopStatus::Skipped));
        assert!(StopStatus::InProgress.can_transition_to(StopStatus::Skipped));
    }

    #[test]
    fn statuses_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&StopStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&ConfigStatus::Confirmed).unwrap(),
            "\"CONFIRMED\""
        );
    }
}
