//! Many-to-many association membership records.
//!
//! # Responsibility
//! - Define the generic membership shape reused by every association kind.
//! - Name the association kinds the reconciliation engine manages.
//!
//! # Invariants
//! - `(owner_id, member_id)` is unique within one association kind.
//! - Membership rows are created and deleted whole; never partially updated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of the owning side of an association (contract, proposal).
pub type OwnerId = i64;
/// Identifier of the member side of an association (distributor, product, ...).
pub type MemberId = i64;

/// Association kinds managed by the reconciliation engine.
///
/// Each kind maps onto one concrete join table; the diff/apply logic is
/// identical across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    ContractDistributor,
    ContractIndustry,
    ContractOpCo,
    ProposalProduct,
}

impl AssociationKind {
    /// Short name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContractDistributor => "contract_distributor",
            Self::ContractIndustry => "contract_industry",
            Self::ContractOpCo => "contract_opco",
            Self::ProposalProduct => "proposal_product",
        }
    }

    /// Human-readable name of the owning entity, used in error reporting.
    pub fn owner_entity(self) -> &'static str {
        match self {
            Self::ContractDistributor | Self::ContractIndustry | Self::ContractOpCo => "contract",
            Self::ProposalProduct => "proposal",
        }
    }

    /// Human-readable name of the member entity, used in error reporting.
    pub fn member_entity(self) -> &'static str {
        match self {
            Self::ContractDistributor => "distributor",
            Self::ContractIndustry => "industry",
            Self::ContractOpCo => "opco",
            Self::ProposalProduct => "product",
        }
    }
}

/// One persisted membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub owner_id: OwnerId,
    pub member_id: MemberId,
    /// Assignment timestamp in epoch milliseconds. Never rewritten by a
    /// re-sync that keeps the member.
    pub assigned_date_ms: i64,
    /// Actor who introduced the membership.
    pub assigned_by: String,
}

/// Minimal add/remove delta computed by the reconciliation engine.
///
/// Members present in both the current and desired sets appear in neither
/// list, which is what keeps re-syncs idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDelta {
    /// Member ids to insert, ascending.
    pub to_add: Vec<MemberId>,
    /// Member ids to delete, ascending.
    pub to_remove: Vec<MemberId>,
}

impl MembershipDelta {
    /// True when applying the delta would write nothing.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the minimal delta between current and desired membership sets.
///
/// Pure set difference; `BTreeSet` iteration yields ascending member ids on
/// both sides, which keeps apply order deterministic.
pub fn reconcile(current: &BTreeSet<MemberId>, desired: &BTreeSet<MemberId>) -> MembershipDelta {
    MembershipDelta {
        to_add: desired.difference(current).copied().collect(),
        to_remove: current.difference(desired).copied().collect(),
    }
}
