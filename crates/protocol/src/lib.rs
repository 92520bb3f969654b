//! Data types for the warden login health engine.
//!
//! This crate contains the serde-serializable records that flow between the
//! store, the health validator, the agent gate and the CLI.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and small predicates
//! * Storage shaped: Field names match the persisted JSON (camelCase)
//! * Stable: Changes only when the persisted format changes
//!
//! Policy (probing, classification, gating) lives in the `warden` crate.

pub mod cookie;
pub mod ids;
pub mod records;
pub mod results;
pub mod snapshot;
pub mod status;

pub use cookie::*;
pub use ids::*;
pub use records::*;
pub use results::*;
pub use snapshot::*;
pub use status::*;
