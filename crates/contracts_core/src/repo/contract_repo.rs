//! Contract/version repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist contract headers, versions and version price snapshots.
//! - Own the atomic current-version transition: insert new version, flip the
//!   previous current off, bump the contract's version pointer.
//!
//! # Invariants
//! - The current-version flip and the pointer bump commit together or not
//!   at all; a version insert never leaves two or zero current versions.
//! - The pointer bump is a compare-and-swap on the expected version number;
//!   a concurrent writer surfaces as `VersionNumberConflict`.
//! - Persisted versions and price rows are never updated in place.

use crate::db::DbError;
use crate::model::contract::{
    Contract, ContractId, ContractVersion, ContractVersionPrice, PriceValidationError, ProductId,
    VersionId,
};
use crate::repo::table_exists;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const VERSION_SELECT_SQL: &str = "SELECT
    id,
    contract_id,
    version_number,
    title,
    change_reason,
    start_date_ms,
    end_date_ms,
    is_current,
    created_by,
    created_at_ms
FROM contract_versions";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for contract persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(PriceValidationError),
    ContractNotFound(ContractId),
    VersionNotFound(VersionId),
    /// The contract's version pointer moved between read and write.
    VersionNumberConflict {
        contract_id: ContractId,
        expected: i64,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::ContractNotFound(id) => write!(f, "contract not found: {id}"),
            Self::VersionNotFound(id) => write!(f, "contract version not found: {id}"),
            Self::VersionNumberConflict {
                contract_id,
                expected,
            } => write!(
                f,
                "contract {contract_id} version pointer no longer at {expected}; concurrent writer won"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing; migrations not applied")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted contract data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PriceValidationError> for RepoError {
    fn from(value: PriceValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Resolved price row ready for insertion under a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPriceRow {
    pub product_id: ProductId,
    pub price_cents: i64,
    pub price_type: Option<String>,
    pub uom: String,
}

/// Insert shape for one new contract version with its price snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersionSpec {
    pub version_number: i64,
    pub title: String,
    pub change_reason: Option<String>,
    pub start_date_ms: Option<i64>,
    pub end_date_ms: Option<i64>,
    pub created_by: String,
    pub prices: Vec<NewPriceRow>,
}

/// Repository interface consumed by the version lifecycle service.
pub trait ContractRepository {
    /// Creates a contract together with its first version, atomically.
    fn create_contract_with_first_version(
        &mut self,
        name: &str,
        first: &NewVersionSpec,
    ) -> RepoResult<Contract>;
    /// Gets one contract header by id.
    fn get_contract(&self, id: ContractId) -> RepoResult<Option<Contract>>;
    /// Gets the version currently marked current for a contract.
    fn current_version(&self, contract_id: ContractId) -> RepoResult<Option<ContractVersion>>;
    /// Gets one version by id, including its price rows.
    fn get_version(&self, version_id: VersionId) -> RepoResult<Option<ContractVersion>>;
    /// True when the referenced product exists.
    fn product_exists(&self, product_id: ProductId) -> RepoResult<bool>;
    /// Inserts a new version as current in one transaction: CAS the contract
    /// pointer from `expected_current`, flip the old current off, insert the
    /// version and its prices.
    fn insert_version_as_current(
        &mut self,
        contract_id: ContractId,
        expected_current: i64,
        spec: &NewVersionSpec,
    ) -> RepoResult<ContractVersion>;
}

/// SQLite-backed contract repository.
pub struct SqliteContractRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteContractRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        for table in [
            "contracts",
            "contract_versions",
            "contract_version_prices",
            "products",
        ] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl ContractRepository for SqliteContractRepository<'_> {
    fn create_contract_with_first_version(
        &mut self,
        name: &str,
        first: &NewVersionSpec,
    ) -> RepoResult<Contract> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO contracts (name, current_version_number, created_by)
             VALUES (?1, ?2, ?3);",
            params![name, first.version_number, first.created_by],
        )?;
        let contract_id = tx.last_insert_rowid();
        insert_version_rows(&tx, contract_id, first)?;

        tx.commit()?;

        self.get_contract(contract_id)?
            .ok_or(RepoError::ContractNotFound(contract_id))
    }

    fn get_contract(&self, id: ContractId) -> RepoResult<Option<Contract>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, current_version_number, created_by, created_at_ms
             FROM contracts
             WHERE id = ?1;",
        )?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(Contract {
                id: row.get("id")?,
                name: row.get("name")?,
                current_version_number: row.get("current_version_number")?,
                created_by: row.get("created_by")?,
                created_at_ms: row.get("created_at_ms")?,
            }));
        }

        Ok(None)
    }

    fn current_version(&self, contract_id: ContractId) -> RepoResult<Option<ContractVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE contract_id = ?1
               AND is_current = 1;"
        ))?;

        let mut rows = stmt.query([contract_id])?;
        if let Some(row) = rows.next()? {
            let mut version = parse_version_row(row)?;
            version.prices = load_prices(self.conn, version.id)?;
            return Ok(Some(version));
        }

        Ok(None)
    }

    fn get_version(&self, version_id: VersionId) -> RepoResult<Option<ContractVersion>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{VERSION_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([version_id])?;
        if let Some(row) = rows.next()? {
            let mut version = parse_version_row(row)?;
            version.prices = load_prices(self.conn, version.id)?;
            return Ok(Some(version));
        }

        Ok(None)
    }

    fn product_exists(&self, product_id: ProductId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1);",
            [product_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_version_as_current(
        &mut self,
        contract_id: ContractId,
        expected_current: i64,
        spec: &NewVersionSpec,
    ) -> RepoResult<ContractVersion> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Compare-and-swap on the version pointer. Zero rows changed means
        // either the contract vanished or a concurrent writer bumped it.
        let changed = tx.execute(
            "UPDATE contracts
             SET current_version_number = ?1
             WHERE id = ?2
               AND current_version_number = ?3;",
            params![spec.version_number, contract_id, expected_current],
        )?;
        if changed == 0 {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM contracts WHERE id = ?1);",
                [contract_id],
                |row| row.get(0),
            )?;
            return Err(if exists == 1 {
                RepoError::VersionNumberConflict {
                    contract_id,
                    expected: expected_current,
                }
            } else {
                RepoError::ContractNotFound(contract_id)
            });
        }

        tx.execute(
            "UPDATE contract_versions
             SET is_current = 0
             WHERE contract_id = ?1
               AND is_current = 1;",
            [contract_id],
        )?;

        let version_id = insert_version_rows(&tx, contract_id, spec)?;
        tx.commit()?;

        self.get_version(version_id)?
            .ok_or(RepoError::VersionNotFound(version_id))
    }
}

fn insert_version_rows(
    conn: &Connection,
    contract_id: ContractId,
    spec: &NewVersionSpec,
) -> RepoResult<VersionId> {
    conn.execute(
        "INSERT INTO contract_versions (
            contract_id,
            version_number,
            title,
            change_reason,
            start_date_ms,
            end_date_ms,
            is_current,
            created_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7);",
        params![
            contract_id,
            spec.version_number,
            spec.title.as_str(),
            spec.change_reason.as_deref(),
            spec.start_date_ms,
            spec.end_date_ms,
            spec.created_by.as_str(),
        ],
    )?;
    let version_id = conn.last_insert_rowid();

    for price in &spec.prices {
        conn.execute(
            "INSERT INTO contract_version_prices (
                version_id,
                product_id,
                price_cents,
                price_type,
                uom
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                version_id,
                price.product_id,
                price.price_cents,
                price.price_type.as_deref(),
                price.uom.as_str(),
            ],
        )?;
    }

    Ok(version_id)
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<ContractVersion> {
    let is_current = match row.get::<_, i64>("is_current")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_current value `{other}` in contract_versions.is_current"
            )));
        }
    };

    Ok(ContractVersion {
        id: row.get("id")?,
        contract_id: row.get("contract_id")?,
        version_number: row.get("version_number")?,
        title: row.get("title")?,
        change_reason: row.get("change_reason")?,
        start_date_ms: row.get("start_date_ms")?,
        end_date_ms: row.get("end_date_ms")?,
        is_current,
        created_by: row.get("created_by")?,
        created_at_ms: row.get("created_at_ms")?,
        prices: Vec::new(),
    })
}

fn load_prices(conn: &Connection, version_id: VersionId) -> RepoResult<Vec<ContractVersionPrice>> {
    let mut stmt = conn.prepare(
        "SELECT id, version_id, product_id, price_cents, price_type, uom
         FROM contract_version_prices
         WHERE version_id = ?1
         ORDER BY product_id ASC, id ASC;",
    )?;

    let mut rows = stmt.query([version_id])?;
    let mut prices = Vec::new();
    while let Some(row) = rows.next()? {
        prices.push(ContractVersionPrice {
            id: row.get("id")?,
            version_id: row.get("version_id")?,
            product_id: row.get("product_id")?,
            price_cents: row.get("price_cents")?,
            price_type: row.get("price_type")?,
            uom: row.get("uom")?,
        });
    }

    Ok(prices)
}
