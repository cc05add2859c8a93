//! routegrid-state — embedded state store for the plan lifecycle engine.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and
//! in-memory storage for configurations, jobs, orders, route stops, stop
//! history, workflow definitions, reassignment records, plan metrics and
//! the audit trail.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Every key starts with the tenant id (`{tenant}/{id}`,
//! `{tenant}/{parent}:{child}`), so tenant isolation is a prefix scan and
//! cross-tenant reads cannot happen by construction.
//!
//! Besides plain CRUD the store exposes the four multi-entity commit
//! operations of the lifecycle engine ([`store::StateStore::commit_confirmation`]
//! and friends in `commits.rs`). Each runs inside a single redb write
//! transaction; redb serializes writers, so a status re-check inside the
//! transaction is the optimistic "guarded UPDATE" of the design.
//!
//! The `StateStore` is `Clone + Send + Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod commits;
pub mod error;
pub mod store;
pub mod tables;

#[cfg(test)]
pub(crate) mod test_support;

pub use commits::{ConfirmationCommit, ConfirmationStamp, PlanDeletion, StopCommit};
pub use error::{StateError, StateResult};
pub use store::StateStore;
