use contracts_core::db::migrations::latest_version;
use contracts_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const CORE_TABLES: &[&str] = &[
    "contracts",
    "contract_versions",
    "contract_version_prices",
    "products",
    "distributors",
    "industries",
    "opcos",
    "proposals",
    "contract_distributors",
    "contract_industries",
    "contract_opcos",
    "proposal_products",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in CORE_TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contracts.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "contracts");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_membership_rows_are_rejected_by_schema() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO contracts (name, current_version_number, created_by)
         VALUES ('c', 1, 'seed');",
        [],
    )
    .unwrap();
    conn.execute("INSERT INTO distributors (name) VALUES ('d');", [])
        .unwrap();

    conn.execute(
        "INSERT INTO contract_distributors (owner_id, member_id, assigned_date_ms, assigned_by)
         VALUES (1, 1, 0, 'seed');",
        [],
    )
    .unwrap();
    let duplicate = conn.execute(
        "INSERT INTO contract_distributors (owner_id, member_id, assigned_date_ms, assigned_by)
         VALUES (1, 1, 0, 'seed');",
        [],
    );
    assert!(duplicate.is_err());
}

#[test]
fn second_current_version_is_rejected_by_schema() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO contracts (name, current_version_number, created_by)
         VALUES ('c', 1, 'seed');",
        [],
    )
    .unwrap();

    conn.execute(
        "INSERT INTO contract_versions (contract_id, version_number, title, is_current, created_by)
         VALUES (1, 1, 'v1', 1, 'seed');",
        [],
    )
    .unwrap();
    let second_current = conn.execute(
        "INSERT INTO contract_versions (contract_id, version_number, title, is_current, created_by)
         VALUES (1, 2, 'v2', 1, 'seed');",
        [],
    );
    assert!(second_current.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table `{table_name}` should exist");
}
