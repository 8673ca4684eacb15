//! Core domain logic for versioned commercial contracts.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::contract::{
    Contract, ContractId, ContractVersion, ContractVersionPrice, PriceEntry, PriceValidationError,
    ProductId, VersionId,
};
pub use model::membership::{
    AssociationKind, MemberId, MembershipDelta, MembershipRecord, OwnerId,
};
pub use normalize::price_type::{
    LabelResolution, NormalizerConfig, NormalizerConfigError, PriceTypeNormalizer,
};
pub use repo::contract_repo::{
    ContractRepository, NewPriceRow, NewVersionSpec, RepoError, RepoResult,
    SqliteContractRepository,
};
pub use repo::membership_repo::{MembershipRepository, SqliteMembershipRepository};
pub use service::sync_service::{reconcile, MembershipSyncService, SyncReport};
pub use service::version_service::{CreateContractRequest, CreateVersionRequest, VersionService};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
