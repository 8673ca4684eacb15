//! Domain model for versioned commercial contracts.
//!
//! # Responsibility
//! - Define the canonical records shared by repositories and services.
//! - Keep input validation close to the data shapes it protects.
//!
//! # Invariants
//! - Every entity is identified by a stable integer row id.
//! - Contract versions and their price rows are immutable once persisted.

pub mod contract;
pub mod membership;
