//! routegrid-confirm — the plan confirmation transaction.
//!
//! Converts a completed optimization job into durable state: configuration
//! DRAFT → CONFIRMED, still-PENDING orders → ASSIGNED, bulk route stop
//! creation, write-once plan metrics — all inside one store transaction —
//! followed by a best-effort audit entry and release of the tenant's
//! advisory optimization lock.

pub mod engine;
pub mod lock;

pub use engine::{
    ConfirmError, ConfirmOutcome, ConfirmRequest, ConfirmationEngine, SkippedOrders,
};
pub use lock::TenantLocks;
