//! Association membership reconciliation service.
//!
//! # Responsibility
//! - Bring one owner's persisted membership set into agreement with a
//!   caller-supplied desired set via minimal add/remove deltas.
//! - Validate owner and member references before any write.
//!
//! # Invariants
//! - Members present in both sets are never rewritten; their assignment
//!   metadata survives every re-sync.
//! - Re-syncing an identical desired set performs zero writes.
//! - An empty desired set clears all memberships for the owner.
//! - Adds and removals apply in ascending member-id order.

use crate::model::membership::{MemberId, MembershipRecord, OwnerId};
use crate::repo::membership_repo::MembershipRepository;
use crate::service::{now_epoch_ms, ServiceError, ServiceResult};
use log::info;
use std::collections::BTreeSet;

pub use crate::model::membership::reconcile;

/// Outcome summary of one sync call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    /// Members present before and after; untouched by the sync.
    pub unchanged: usize,
}

/// Reconciliation engine over one association kind.
pub struct MembershipSyncService<R: MembershipRepository> {
    repo: R,
}

impl<R: MembershipRepository> MembershipSyncService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Synchronizes the owner's memberships to exactly `desired_member_ids`.
    ///
    /// Duplicate ids in the input are deduplicated before diffing. Unknown
    /// owners fail with `NotFound`; any unknown member id fails with
    /// `Validation` and aborts the whole sync with no partial writes.
    pub fn sync(
        &mut self,
        owner_id: OwnerId,
        desired_member_ids: &[MemberId],
        actor: &str,
    ) -> ServiceResult<SyncReport> {
        let kind = self.repo.kind();

        if !self.repo.owner_exists(owner_id)? {
            return Err(ServiceError::NotFound {
                entity: kind.owner_entity(),
                id: owner_id,
            });
        }

        let desired: BTreeSet<MemberId> = desired_member_ids.iter().copied().collect();

        let missing = self.repo.missing_members(&desired)?;
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!(
                "unknown {} ids: {missing:?}",
                kind.member_entity()
            )));
        }

        // Diff and apply happen inside one repository transaction so that
        // concurrent syncs for the same owner serialize instead of merging.
        let delta = self
            .repo
            .sync_memberships(owner_id, &desired, actor, now_epoch_ms())?;
        let report = SyncReport {
            added: delta.to_add.len(),
            removed: delta.to_remove.len(),
            unchanged: desired.len() - delta.to_add.len(),
        };

        if delta.is_empty() {
            info!(
                "event=membership_sync module=service status=noop kind={} owner_id={owner_id} unchanged={}",
                kind.as_str(),
                report.unchanged
            );
            return Ok(report);
        }

        info!(
            "event=membership_sync module=service status=ok kind={} owner_id={owner_id} added={} removed={} unchanged={}",
            kind.as_str(),
            report.added,
            report.removed,
            report.unchanged
        );

        Ok(report)
    }

    /// Lists the owner's persisted memberships, ascending by member id.
    pub fn memberships(&self, owner_id: OwnerId) -> ServiceResult<Vec<MembershipRecord>> {
        if !self.repo.owner_exists(owner_id)? {
            return Err(ServiceError::NotFound {
                entity: self.repo.kind().owner_entity(),
                id: owner_id,
            });
        }
        Ok(self.repo.load_memberships(owner_id)?)
    }
}
