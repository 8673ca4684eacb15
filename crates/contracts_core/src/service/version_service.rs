//! Contract version lifecycle service.
//!
//! # Responsibility
//! - Create and number contract versions and their price snapshots.
//! - Resolve price lines: explicit entries, carried-forward copies from a
//!   source version, or none.
//! - Normalize legacy price-type text when a normalizer is configured.
//!
//! # Invariants
//! - After any successful creation exactly one version per contract is
//!   current, and it carries the maximum version number.
//! - Version numbers are assigned as `current + 1` and never reused.
//! - All input validation happens before any write; the flip/bump transition
//!   is delegated to the repository as one atomic unit.
//! - Explicit `prices` take precedence over `source_version_id` when a
//!   request carries both; this mirrors long-standing caller expectations
//!   and is deliberate, not accidental.

use crate::model::contract::{Contract, ContractId, ContractVersion, PriceEntry, VersionId};
use crate::normalize::price_type::{LabelResolution, PriceTypeNormalizer};
use crate::repo::contract_repo::{ContractRepository, NewPriceRow, NewVersionSpec};
use crate::service::{ServiceError, ServiceResult};
use log::{info, warn};

/// Request to create a contract together with its first version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContractRequest {
    pub name: String,
    pub title: String,
    pub change_reason: Option<String>,
    pub start_date_ms: Option<i64>,
    pub end_date_ms: Option<i64>,
    pub prices: Vec<PriceEntry>,
}

/// Request to create the next version of an existing contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateVersionRequest {
    pub title: String,
    pub change_reason: Option<String>,
    pub start_date_ms: Option<i64>,
    pub end_date_ms: Option<i64>,
    /// Explicit price lines. Non-empty input wins over `source_version_id`.
    pub prices: Vec<PriceEntry>,
    /// Version whose price lines are duplicated when no explicit prices are
    /// given. Copy, not link: the source rows stay independent.
    pub source_version_id: Option<VersionId>,
}

enum PriceTypeDecision {
    Keep(Option<String>),
    Drop,
}

/// Version lifecycle manager over a contract repository.
pub struct VersionService<R: ContractRepository> {
    repo: R,
    normalizer: Option<PriceTypeNormalizer>,
}

impl<R: ContractRepository> VersionService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            normalizer: None,
        }
    }

    /// Enables legacy price-type normalization for incoming price entries.
    pub fn with_normalizer(mut self, normalizer: PriceTypeNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Creates a contract and its version 1 in one atomic operation.
    ///
    /// Guarantees every contract managed by this service has a current
    /// version from the moment it exists.
    pub fn create_contract(
        &mut self,
        request: &CreateContractRequest,
        actor: &str,
    ) -> ServiceResult<Contract> {
        let name = required_text(&request.name, "name")?;
        let title = required_text(&request.title, "title")?;
        validate_date_range(request.start_date_ms, request.end_date_ms)?;
        let prices = self.build_rows_from_entries(&request.prices)?;

        let spec = NewVersionSpec {
            version_number: 1,
            title,
            change_reason: request.change_reason.clone(),
            start_date_ms: request.start_date_ms,
            end_date_ms: request.end_date_ms,
            created_by: actor.to_string(),
            prices,
        };
        let contract = self.repo.create_contract_with_first_version(&name, &spec)?;

        info!(
            "event=contract_create module=service status=ok contract_id={} version=1 prices={}",
            contract.id,
            spec.prices.len()
        );
        Ok(contract)
    }

    /// Creates the next version of `contract_id` and makes it current.
    ///
    /// # Errors
    /// - `NotFound` when the contract does not exist.
    /// - `InvalidState` when the contract has no current version.
    /// - `Validation` on malformed input, unknown products or an unusable
    ///   source version; nothing is written.
    /// - `Conflict` when a concurrent creation won the version number; the
    ///   caller decides whether to retry.
    pub fn create_version(
        &mut self,
        contract_id: ContractId,
        request: &CreateVersionRequest,
        actor: &str,
    ) -> ServiceResult<ContractVersion> {
        let contract = self
            .repo
            .get_contract(contract_id)?
            .ok_or(ServiceError::NotFound {
                entity: "contract",
                id: contract_id,
            })?;
        let current = self
            .repo
            .current_version(contract_id)?
            .ok_or_else(|| {
                ServiceError::InvalidState(format!(
                    "contract {contract_id} has no current version"
                ))
            })?;
        if current.version_number != contract.current_version_number {
            return Err(ServiceError::InvalidState(format!(
                "contract {contract_id} version pointer is {} but current version is {}",
                contract.current_version_number, current.version_number
            )));
        }

        let title = required_text(&request.title, "title")?;
        validate_date_range(request.start_date_ms, request.end_date_ms)?;
        let prices = self.resolve_price_rows(contract_id, request)?;

        let spec = NewVersionSpec {
            version_number: contract.current_version_number + 1,
            title,
            change_reason: request.change_reason.clone(),
            start_date_ms: request.start_date_ms,
            end_date_ms: request.end_date_ms,
            created_by: actor.to_string(),
            prices,
        };
        let version =
            self.repo
                .insert_version_as_current(contract_id, contract.current_version_number, &spec)?;

        info!(
            "event=version_create module=service status=ok contract_id={contract_id} version={} prices={}",
            version.version_number,
            version.prices.len()
        );
        Ok(version)
    }

    /// Gets one contract header by id.
    pub fn get_contract(&self, contract_id: ContractId) -> ServiceResult<Option<Contract>> {
        Ok(self.repo.get_contract(contract_id)?)
    }

    /// Gets the current version of a contract, with price rows.
    pub fn current_version(
        &self,
        contract_id: ContractId,
    ) -> ServiceResult<Option<ContractVersion>> {
        Ok(self.repo.current_version(contract_id)?)
    }

    /// Gets one version by id, with price rows.
    pub fn get_version(&self, version_id: VersionId) -> ServiceResult<Option<ContractVersion>> {
        Ok(self.repo.get_version(version_id)?)
    }

    fn resolve_price_rows(
        &self,
        contract_id: ContractId,
        request: &CreateVersionRequest,
    ) -> ServiceResult<Vec<NewPriceRow>> {
        if !request.prices.is_empty() {
            return self.build_rows_from_entries(&request.prices);
        }

        if let Some(source_version_id) = request.source_version_id {
            let source = self.repo.get_version(source_version_id)?.ok_or_else(|| {
                ServiceError::Validation(format!("unknown source version {source_version_id}"))
            })?;
            if source.contract_id != contract_id {
                return Err(ServiceError::Validation(format!(
                    "source version {source_version_id} belongs to contract {}, not {contract_id}",
                    source.contract_id
                )));
            }
            let copies = source
                .prices
                .iter()
                .map(|price| NewPriceRow {
                    product_id: price.product_id,
                    price_cents: price.price_cents,
                    price_type: price.price_type.clone(),
                    uom: price.uom.clone(),
                })
                .collect();
            return Ok(copies);
        }

        // A version without price lines is explicitly allowed.
        Ok(Vec::new())
    }

    fn build_rows_from_entries(&self, entries: &[PriceEntry]) -> ServiceResult<Vec<NewPriceRow>> {
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            entry
                .validate()
                .map_err(|err| ServiceError::Validation(err.to_string()))?;
            if !self.repo.product_exists(entry.product_id)? {
                return Err(ServiceError::Validation(format!(
                    "unknown product {}",
                    entry.product_id
                )));
            }

            match self.resolve_price_type(entry) {
                PriceTypeDecision::Keep(price_type) => rows.push(NewPriceRow {
                    product_id: entry.product_id,
                    price_cents: entry.price_cents,
                    price_type,
                    uom: entry.uom.trim().to_string(),
                }),
                PriceTypeDecision::Drop => {}
            }
        }
        Ok(rows)
    }

    fn resolve_price_type(&self, entry: &PriceEntry) -> PriceTypeDecision {
        let raw = match entry.price_type.as_deref().map(str::trim) {
            None | Some("") => return PriceTypeDecision::Keep(None),
            Some(raw) => raw,
        };

        let Some(normalizer) = &self.normalizer else {
            return PriceTypeDecision::Keep(Some(raw.to_string()));
        };

        match normalizer.resolve(raw) {
            LabelResolution::Mapped { label, reason } => {
                info!(
                    "event=price_type_map module=service status=mapped product_id={} raw=`{raw}` mapped=`{label}` reason=`{reason}`",
                    entry.product_id
                );
                PriceTypeDecision::Keep(Some(label))
            }
            LabelResolution::Excluded { rule, reason } => {
                warn!(
                    "event=price_type_map module=service status=excluded product_id={} raw=`{raw}` rule=`{rule}` reason=`{reason}`",
                    entry.product_id
                );
                PriceTypeDecision::Drop
            }
            LabelResolution::Unknown { reason } => {
                warn!(
                    "event=price_type_map module=service status=unknown product_id={} raw=`{raw}` reason=`{reason}`",
                    entry.product_id
                );
                PriceTypeDecision::Keep(None)
            }
        }
    }
}

fn required_text(value: &str, field: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_date_range(start_ms: Option<i64>, end_ms: Option<i64>) -> ServiceResult<()> {
    if let (Some(start), Some(end)) = (start_ms, end_ms) {
        if end < start {
            return Err(ServiceError::Validation(format!(
                "end date {end} precedes start date {start}"
            )));
        }
    }
    Ok(())
}
