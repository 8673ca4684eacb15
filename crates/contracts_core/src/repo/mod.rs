//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Multi-row invariants (version flips, membership deltas) are applied in
//!   single immediate transactions; partial application is unrepresentable.
//! - Repository APIs return semantic errors (`NotFound`, conflicts) in
//!   addition to DB transport errors.

pub mod contract_repo;
pub mod membership_repo;

use contract_repo::RepoResult;
use rusqlite::Connection;

pub(crate) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
