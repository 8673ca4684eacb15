//! Fuzzy normalization of noisy text labels onto canonical sets.
//!
//! # Responsibility
//! - Resolve free-text price-type labels entered inconsistently over years
//!   of data onto a fixed canonical enumeration.
//! - Keep the accept/exclude/unknown decision deterministic.
//!
//! # Invariants
//! - Resolution is pure: no I/O, no locking, safe under concurrency.
//! - Absence of a confident match is a normal outcome, not an error.

pub mod distance;
pub mod price_type;
