//! routegrid-stops — the route stop state machine.
//!
//! Drives a stop through PENDING → IN_PROGRESS → {COMPLETED, FAILED} (and
//! SKIPPED from the two non-terminal states) under the tenant's workflow
//! graph. Each accepted transition commits atomically with its history
//! entry and the order cascade.

pub mod engine;

pub use engine::{StopEngine, StopError, TransitionOutcome, TransitionRequest};
