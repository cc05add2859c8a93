//! routegrid-reassign — moving work between drivers mid-execution.
//!
//! Three tenant- and job-scoped operations: `options` ranks replacement
//! drivers for an absent one, `impact` estimates what a candidate would
//! absorb, and `apply` rewrites the job's result (and, on a confirmed
//! plan, the live stop rows) in one atomic commit. Distances are
//! great-circle estimates; there is no road network in this engine.

pub mod engine;
pub mod geo;

pub use engine::{
    ApplyOutcome, ApplyRequest, AvailabilityStatus, CandidateDriver, ImpactEstimate,
    ImpactRequest, OptionsOutcome, OptionsRequest, OrderMove, RankStrategy, ReassignError,
    ReassignmentEngine,
};
