//! routegrid-validate — read-only plan checks and metrics.
//!
//! The validator cross-checks an optimization result against live order,
//! vehicle and driver state and produces classified issues; it never
//! writes. The metrics calculator derives aggregate plan quality figures
//! and compares them with the tenant's previous confirmed plan. Both run
//! before the confirmation transaction.

pub mod metrics;
pub mod validator;

pub use metrics::compute_metrics;
pub use validator::{IssueCode, PlanValidator, Severity, ValidationIssue, ValidationReport};
