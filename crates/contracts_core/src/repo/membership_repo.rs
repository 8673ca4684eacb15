//! Membership repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the generic `(owner_id, member_id)` membership shape for every
//!   association kind behind one interface.
//! - Apply reconciliation deltas atomically.
//!
//! # Invariants
//! - `sync_memberships` reads the current set, diffs and applies the delta
//!   inside one immediate transaction: the whole delta lands or none of it
//!   does, and the read happens under the same write lock as the apply, so
//!   concurrent syncs for one owner serialize instead of merging.
//! - Rows outside the delta are never touched; assignment metadata survives
//!   re-syncs that keep the member.
//!
//! Table names are resolved from the association kind at construction; the
//! SQL shape is identical across kinds.

use crate::model::membership::{
    reconcile, AssociationKind, MemberId, MembershipDelta, MembershipRecord, OwnerId,
};
use crate::repo::contract_repo::{RepoError, RepoResult};
use crate::repo::table_exists;
use rusqlite::{params, Connection, TransactionBehavior};
use std::collections::BTreeSet;

/// Concrete tables backing one association kind.
#[derive(Debug, Clone, Copy)]
struct JoinSpec {
    join_table: &'static str,
    owner_table: &'static str,
    member_table: &'static str,
}

fn join_spec(kind: AssociationKind) -> JoinSpec {
    match kind {
        AssociationKind::ContractDistributor => JoinSpec {
            join_table: "contract_distributors",
            owner_table: "contracts",
            member_table: "distributors",
        },
        AssociationKind::ContractIndustry => JoinSpec {
            join_table: "contract_industries",
            owner_table: "contracts",
            member_table: "industries",
        },
        AssociationKind::ContractOpCo => JoinSpec {
            join_table: "contract_opcos",
            owner_table: "contracts",
            member_table: "opcos",
        },
        AssociationKind::ProposalProduct => JoinSpec {
            join_table: "proposal_products",
            owner_table: "proposals",
            member_table: "products",
        },
    }
}

/// Repository interface consumed by the membership sync service.
pub trait MembershipRepository {
    /// Association kind this repository instance serves.
    fn kind(&self) -> AssociationKind;
    /// True when the owning entity exists.
    fn owner_exists(&self, owner_id: OwnerId) -> RepoResult<bool>;
    /// Subset of `member_ids` that do not reference an existing member entity.
    fn missing_members(&self, member_ids: &BTreeSet<MemberId>) -> RepoResult<Vec<MemberId>>;
    /// All persisted membership rows for one owner, ascending by member id.
    fn load_memberships(&self, owner_id: OwnerId) -> RepoResult<Vec<MembershipRecord>>;
    /// Reconciles the owner's memberships to exactly `desired` and returns
    /// the delta that was applied.
    ///
    /// Read, diff and apply run in one immediate transaction: the current
    /// set is read under the write lock, so the last committed desired set
    /// wins outright and concurrent desired sets never merge.
    fn sync_memberships(
        &mut self,
        owner_id: OwnerId,
        desired: &BTreeSet<MemberId>,
        actor: &str,
        assigned_date_ms: i64,
    ) -> RepoResult<MembershipDelta>;
}

/// SQLite-backed membership repository for one association kind.
pub struct SqliteMembershipRepository<'conn> {
    conn: &'conn mut Connection,
    kind: AssociationKind,
    spec: JoinSpec,
}

impl<'conn> SqliteMembershipRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection, kind: AssociationKind) -> RepoResult<Self> {
        let spec = join_spec(kind);
        for table in [spec.join_table, spec.owner_table, spec.member_table] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn, kind, spec })
    }
}

impl MembershipRepository for SqliteMembershipRepository<'_> {
    fn kind(&self) -> AssociationKind {
        self.kind
    }

    fn owner_exists(&self, owner_id: OwnerId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
                self.spec.owner_table
            ),
            [owner_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn missing_members(&self, member_ids: &BTreeSet<MemberId>) -> RepoResult<Vec<MemberId>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
            self.spec.member_table
        ))?;

        let mut missing = Vec::new();
        for member_id in member_ids {
            let exists: i64 = stmt.query_row([member_id], |row| row.get(0))?;
            if exists != 1 {
                missing.push(*member_id);
            }
        }
        Ok(missing)
    }

    fn load_memberships(&self, owner_id: OwnerId) -> RepoResult<Vec<MembershipRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT owner_id, member_id, assigned_date_ms, assigned_by
             FROM {}
             WHERE owner_id = ?1
             ORDER BY member_id ASC;",
            self.spec.join_table
        ))?;

        let mut rows = stmt.query([owner_id])?;
        let mut memberships = Vec::new();
        while let Some(row) = rows.next()? {
            memberships.push(MembershipRecord {
                owner_id: row.get("owner_id")?,
                member_id: row.get("member_id")?,
                assigned_date_ms: row.get("assigned_date_ms")?,
                assigned_by: row.get("assigned_by")?,
            });
        }
        Ok(memberships)
    }

    fn sync_memberships(
        &mut self,
        owner_id: OwnerId,
        desired: &BTreeSet<MemberId>,
        actor: &str,
        assigned_date_ms: i64,
    ) -> RepoResult<MembershipDelta> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The immediate transaction holds the write lock before this read,
        // so the diff is always computed against the committed latest state.
        let current = load_member_ids(&tx, self.spec.join_table, owner_id)?;
        let delta = reconcile(&current, desired);

        for member_id in &delta.to_remove {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE owner_id = ?1 AND member_id = ?2;",
                    self.spec.join_table
                ),
                params![owner_id, member_id],
            )?;
        }

        for member_id in &delta.to_add {
            tx.execute(
                &format!(
                    "INSERT INTO {} (owner_id, member_id, assigned_date_ms, assigned_by)
                     VALUES (?1, ?2, ?3, ?4);",
                    self.spec.join_table
                ),
                params![owner_id, member_id, assigned_date_ms, actor],
            )?;
        }

        tx.commit()?;
        Ok(delta)
    }
}

fn load_member_ids(
    conn: &Connection,
    join_table: &str,
    owner_id: OwnerId,
) -> RepoResult<BTreeSet<MemberId>> {
    let mut stmt =
        conn.prepare(&format!("SELECT member_id FROM {join_table} WHERE owner_id = ?1;"))?;

    let mut rows = stmt.query([owner_id])?;
    let mut member_ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        member_ids.insert(row.get(0)?);
    }
    Ok(member_ids)
}
