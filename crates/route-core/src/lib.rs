//! route-core — domain types for the Routegrid plan lifecycle engine.
//!
//! Entities, status enums, and the typed solver result schema shared by the
//! state store and the engine crates. The solver payload is parsed into
//! typed structs exactly once at the boundary ([`result::OptimizationResult`]);
//! everything downstream works with typed data, never raw JSON.

pub mod result;
pub mod status;
pub mod time;
pub mod types;

pub use result::*;
pub use status::*;
pub use time::{now_epoch, parse_epoch_or_none};
pub use types::*;
