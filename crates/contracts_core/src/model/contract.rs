//! Contract, version and price-line domain records.
//!
//! # Responsibility
//! - Define the contract/version/price shapes used across the core.
//! - Validate caller-supplied price entries before persistence.
//!
//! # Invariants
//! - `Contract::current_version_number` is mutated only by the version
//!   lifecycle service when a new version becomes current.
//! - A persisted `ContractVersion` is never edited in place; corrections
//!   are expressed as new versions.
//! - Prices are stored in minor currency units and are never negative.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier for a contract row.
pub type ContractId = i64;
/// Stable identifier for a contract version row.
pub type VersionId = i64;
/// Stable identifier for a product row.
pub type ProductId = i64;

/// Contract header record.
///
/// The header itself carries no pricing; authoritative pricing always lives
/// on the version marked current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub name: String,
    /// Version number of the current version. `>= 1` once the first version
    /// exists; monotonic thereafter.
    pub current_version_number: i64,
    pub created_by: String,
    /// Creation timestamp in epoch milliseconds.
    pub created_at_ms: i64,
}

/// Immutable snapshot of a contract at one point of its negotiation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersion {
    pub id: VersionId,
    pub contract_id: ContractId,
    /// Positive, unique per contract, assigned as `max + 1`.
    pub version_number: i64,
    pub title: String,
    pub change_reason: Option<String>,
    pub start_date_ms: Option<i64>,
    pub end_date_ms: Option<i64>,
    /// At most one version per contract carries `true`.
    pub is_current: bool,
    pub created_by: String,
    pub created_at_ms: i64,
    /// Owned price rows, resolved at creation time.
    pub prices: Vec<ContractVersionPrice>,
}

/// Price line owned by exactly one contract version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersionPrice {
    pub id: i64,
    pub version_id: VersionId,
    pub product_id: ProductId,
    /// Negotiated price in minor currency units (cents).
    pub price_cents: i64,
    /// Canonical price-type label, or `None` when unresolved.
    pub price_type: Option<String>,
    /// Unit of measure, e.g. `EA` or `CS`.
    pub uom: String,
}

/// Caller-supplied price line for a new contract version.
///
/// `price_type` may carry raw legacy text; the lifecycle service resolves it
/// onto the canonical set when a normalizer is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub product_id: ProductId,
    pub price_cents: i64,
    pub price_type: Option<String>,
    pub uom: String,
}

impl PriceEntry {
    /// Validates one price entry against model invariants.
    pub fn validate(&self) -> Result<(), PriceValidationError> {
        if self.product_id <= 0 {
            return Err(PriceValidationError::MissingProduct);
        }
        if self.price_cents < 0 {
            return Err(PriceValidationError::NegativePrice(self.price_cents));
        }
        if self.uom.trim().is_empty() {
            return Err(PriceValidationError::EmptyUnitOfMeasure);
        }
        Ok(())
    }
}

/// Validation failure for caller-supplied price entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceValidationError {
    /// Product reference is absent or non-positive.
    MissingProduct,
    /// Negative prices are never valid, in any currency.
    NegativePrice(i64),
    /// Unit of measure must be a non-blank token.
    EmptyUnitOfMeasure,
}

impl Display for PriceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingProduct => write!(f, "price entry requires a product reference"),
            Self::NegativePrice(cents) => {
                write!(f, "price must be >= 0, got {cents} cents")
            }
            Self::EmptyUnitOfMeasure => write!(f, "unit of measure cannot be blank"),
        }
    }
}

impl Error for PriceValidationError {}
