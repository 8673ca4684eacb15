use contracts_core::db::{open_db, open_db_in_memory};
use contracts_core::{
    AssociationKind, MembershipSyncService, ServiceError, SqliteMembershipRepository,
};
use rusqlite::Connection;
use std::thread;

fn seed_contract(conn: &Connection, name: &str) -> i64 {
    conn.execute(
        "INSERT INTO contracts (name, current_version_number, created_by)
         VALUES (?1, 1, 'seed');",
        [name],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn seed_distributor(conn: &Connection, name: &str) -> i64 {
    conn.execute("INSERT INTO distributors (name) VALUES (?1);", [name])
        .unwrap();
    conn.last_insert_rowid()
}

fn seed_proposal(conn: &Connection, title: &str) -> i64 {
    conn.execute("INSERT INTO proposals (title) VALUES (?1);", [title])
        .unwrap();
    conn.last_insert_rowid()
}

fn seed_product(conn: &Connection, name: &str) -> i64 {
    conn.execute("INSERT INTO products (name) VALUES (?1);", [name])
        .unwrap();
    conn.last_insert_rowid()
}

fn distributor_rows(conn: &Connection, owner_id: i64) -> Vec<(i64, i64, String)> {
    let mut stmt = conn
        .prepare(
            "SELECT member_id, assigned_date_ms, assigned_by
             FROM contract_distributors
             WHERE owner_id = ?1
             ORDER BY member_id ASC;",
        )
        .unwrap();
    let rows = stmt
        .query_map([owner_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    rows.map(|row| row.unwrap()).collect()
}

fn stamp_assigned_dates(conn: &Connection, owner_id: i64, stamp: i64) {
    conn.execute(
        "UPDATE contract_distributors SET assigned_date_ms = ?1 WHERE owner_id = ?2;",
        [stamp, owner_id],
    )
    .unwrap();
}

#[test]
fn sync_adds_all_members_in_ascending_order() {
    let mut conn = open_db_in_memory().unwrap();
    let contract = seed_contract(&conn, "c1");
    let d1 = seed_distributor(&conn, "alpha");
    let d2 = seed_distributor(&conn, "beta");
    let d3 = seed_distributor(&conn, "gamma");

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        let report = service.sync(contract, &[d3, d1, d2], "assigner").unwrap();
        assert_eq!(report.added, 3);
        assert_eq!(report.removed, 0);
        assert_eq!(report.unchanged, 0);
    }

    let rows = distributor_rows(&conn, contract);
    assert_eq!(
        rows.iter().map(|row| row.0).collect::<Vec<_>>(),
        vec![d1, d2, d3]
    );
    assert!(rows.iter().all(|row| row.2 == "assigner"));
}

#[test]
fn shrinking_desired_set_removes_only_missing_members() {
    let mut conn = open_db_in_memory().unwrap();
    let contract = seed_contract(&conn, "c1");
    let a = seed_distributor(&conn, "a");
    let b = seed_distributor(&conn, "b");
    let c = seed_distributor(&conn, "c");

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        service.sync(contract, &[a, b, c], "first-actor").unwrap();
    }

    // Sentinel timestamps let us detect any rewrite of surviving rows.
    stamp_assigned_dates(&conn, contract, 42);

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        let report = service.sync(contract, &[a, c], "second-actor").unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.removed, 1);
        assert_eq!(report.unchanged, 2);
    }

    let rows = distributor_rows(&conn, contract);
    assert_eq!(
        rows.iter().map(|row| row.0).collect::<Vec<_>>(),
        vec![a, c]
    );
    // Surviving rows keep their original assignment metadata.
    assert!(rows.iter().all(|row| row.1 == 42));
    assert!(rows.iter().all(|row| row.2 == "first-actor"));
}

#[test]
fn resync_with_identical_set_writes_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let contract = seed_contract(&conn, "c1");
    let a = seed_distributor(&conn, "a");
    let b = seed_distributor(&conn, "b");

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        service.sync(contract, &[a, b], "actor").unwrap();
    }

    stamp_assigned_dates(&conn, contract, 7);

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        let report = service.sync(contract, &[b, a], "other-actor").unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.removed, 0);
        assert_eq!(report.unchanged, 2);
    }

    let rows = distributor_rows(&conn, contract);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.1 == 7));
    assert!(rows.iter().all(|row| row.2 == "actor"));
}

#[test]
fn empty_desired_set_clears_all_memberships() {
    let mut conn = open_db_in_memory().unwrap();
    let contract = seed_contract(&conn, "c1");
    let a = seed_distributor(&conn, "a");
    let b = seed_distributor(&conn, "b");

    let repo =
        SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
            .unwrap();
    let mut service = MembershipSyncService::new(repo);
    service.sync(contract, &[a, b], "actor").unwrap();

    let report = service.sync(contract, &[], "actor").unwrap();
    assert_eq!(report.removed, 2);
    assert!(service.memberships(contract).unwrap().is_empty());
}

#[test]
fn duplicate_desired_ids_are_deduplicated() {
    let mut conn = open_db_in_memory().unwrap();
    let contract = seed_contract(&conn, "c1");
    let a = seed_distributor(&conn, "a");

    let repo =
        SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
            .unwrap();
    let mut service = MembershipSyncService::new(repo);
    let report = service.sync(contract, &[a, a, a], "actor").unwrap();

    assert_eq!(report.added, 1);
    assert_eq!(service.memberships(contract).unwrap().len(), 1);
}

#[test]
fn unknown_owner_fails_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let repo =
        SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
            .unwrap();
    let mut service = MembershipSyncService::new(repo);

    let err = service.sync(404, &[], "actor").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound { entity: "contract", id: 404 }
    ));
}

#[test]
fn unknown_member_aborts_without_partial_writes() {
    let mut conn = open_db_in_memory().unwrap();
    let contract = seed_contract(&conn, "c1");
    let a = seed_distributor(&conn, "a");

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        service.sync(contract, &[a], "actor").unwrap();
    }

    stamp_assigned_dates(&conn, contract, 9);

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ContractDistributor)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        let err = service.sync(contract, &[a, 9999], "actor").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    // The failed sync changed nothing at all.
    let rows = distributor_rows(&conn, contract);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, a);
    assert_eq!(rows[0].1, 9);
}

#[test]
fn concurrent_syncs_never_merge_desired_sets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memberships.db");

    let (contract, d1, d2) = {
        let conn = open_db(&path).unwrap();
        let contract = seed_contract(&conn, "c1");
        (
            contract,
            seed_distributor(&conn, "a"),
            seed_distributor(&conn, "b"),
        )
    };

    // Two writers on separate connections repeatedly sync conflicting
    // desired sets against the same owner.
    let spawn_syncer = |desired: Vec<i64>| {
        let path = path.clone();
        thread::spawn(move || {
            let mut conn = open_db(&path).unwrap();
            for _ in 0..20 {
                let repo = SqliteMembershipRepository::try_new(
                    &mut conn,
                    AssociationKind::ContractDistributor,
                )
                .unwrap();
                let mut service = MembershipSyncService::new(repo);
                service.sync(contract, &desired, "racer").unwrap();
            }
        })
    };

    let first = spawn_syncer(vec![d1]);
    let second = spawn_syncer(vec![d2]);
    first.join().unwrap();
    second.join().unwrap();

    // Whichever sync committed last wins outright.
    let conn = open_db(&path).unwrap();
    let members: Vec<i64> = distributor_rows(&conn, contract)
        .iter()
        .map(|row| row.0)
        .collect();
    assert!(
        members == vec![d1] || members == vec![d2],
        "concurrent desired sets merged: {members:?}"
    );
}

#[test]
fn proposal_product_kind_syncs_through_its_own_tables() {
    let mut conn = open_db_in_memory().unwrap();
    let proposal = seed_proposal(&conn, "fresh produce bid");
    let p1 = seed_product(&conn, "apples");
    let p2 = seed_product(&conn, "pears");

    {
        let repo =
            SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ProposalProduct)
                .unwrap();
        let mut service = MembershipSyncService::new(repo);
        let report = service.sync(proposal, &[p2, p1], "bidder").unwrap();
        assert_eq!(report.added, 2);

        let members: Vec<i64> = service
            .memberships(proposal)
            .unwrap()
            .into_iter()
            .map(|record| record.member_id)
            .collect();
        assert_eq!(members, vec![p1, p2]);
    }

    // The contract-side join table is untouched by proposal syncs.
    let contract_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM contract_distributors;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(contract_rows, 0);
}

#[test]
fn unknown_proposal_owner_uses_kind_specific_entity_name() {
    let mut conn = open_db_in_memory().unwrap();
    let repo =
        SqliteMembershipRepository::try_new(&mut conn, AssociationKind::ProposalProduct).unwrap();
    let mut service = MembershipSyncService::new(repo);

    let err = service.sync(123, &[], "actor").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound { entity: "proposal", id: 123 }
    ));
}
