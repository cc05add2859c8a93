//! routegrid-workflow — tenant-custom delivery states over the fixed core
//! stop machine.
//!
//! Two layers: the immutable five-state core machine
//! ([`route_core::StopStatus::can_transition_to`]) and a per-tenant graph
//! of custom states mapped onto system states. The tenant graph can only
//! narrow the core machine's legal edges, never widen them.
//!
//! The graph is validated once at build time; legality checks afterwards
//! are O(1) set probes because they run on every stop-status update.

pub mod graph;
pub mod registry;

pub use graph::{WorkflowError, WorkflowGraph};
pub use registry::{RegistryError, WorkflowRegistry};
