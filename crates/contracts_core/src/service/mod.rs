//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Map persistence errors onto the caller-facing error taxonomy.
//!
//! # Invariants
//! - Every failure is all-or-nothing; services never leave partially
//!   applied writes behind.
//! - Nothing is retried internally; retry policy belongs to the caller.

pub mod sync_service;
pub mod version_service;

use crate::repo::contract_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing error taxonomy shared by the core services.
#[derive(Debug)]
pub enum ServiceError {
    /// A referenced top-level entity is absent.
    NotFound { entity: &'static str, id: i64 },
    /// Malformed input or an unknown referenced sub-entity.
    Validation(String),
    /// Persisted state violates a precondition (e.g. no current version).
    InvalidState(String),
    /// A concurrent writer won; the caller may retry.
    Conflict(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::InvalidState(message) => write!(f, "invalid state: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ContractNotFound(id) => Self::NotFound {
                entity: "contract",
                id,
            },
            RepoError::VersionNotFound(id) => Self::NotFound {
                entity: "contract version",
                id,
            },
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            RepoError::VersionNumberConflict {
                contract_id,
                expected,
            } => Self::Conflict(format!(
                "contract {contract_id} version pointer moved past {expected}"
            )),
            other => Self::Repo(other),
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
