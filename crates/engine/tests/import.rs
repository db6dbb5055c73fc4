mod common;

use sea_orm::ConnectionTrait;

use engine::{
    BankAccountCmd, DateRange, DuplicatePolicy, EngineError, ImportRecord, UnbookedTransaction,
    read_csv,
};

use common::{
    OTHER, OWNER, at, bank_account, date, engine, engine_with_database, realm, unbooked,
};

const STATEMENT: &str = "date,description,amount\n\
                         2026-03-01,Coffee,-3.50\n\
                         2026-03-02,Store X,-50.00\n\
                         2026-03-02,Store X,-50.00\n\
                         02.03.2026,Salary,\"2500,00\"\n";

#[tokio::test]
async fn importing_the_same_statement_twice_skips_everything() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;

    let first = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            read_csv(STATEMENT.as_bytes()),
            &DuplicatePolicy::SameDateAmountAndDescription,
            OWNER,
        )
        .await
        .unwrap();
    assert_eq!(first.imported, 4);
    assert_eq!(first.skipped, 0);
    assert_eq!(first.error, None);

    let second = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            read_csv(STATEMENT.as_bytes()),
            &DuplicatePolicy::SameDateAmountAndDescription,
            OWNER,
        )
        .await
        .unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped, 4);

    let rows = engine
        .get_unbooked_transactions(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    let balance = engine
        .bank_account_balance(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(balance, 239_650);
}

#[tokio::test]
async fn overlapping_statement_appends_the_new_tail() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    unbooked(&engine, &realm_id, "checking", -350, "Coffee", at(2026, 3, 1)).await;

    let records = vec![
        Ok(ImportRecord::new(at(2026, 3, 2), -350).description("Coffee")),
        Ok(ImportRecord::new(at(2026, 3, 1), -350).description("Coffee")),
        Ok(ImportRecord::new(at(2026, 3, 2), -350).description("Coffee")),
    ];
    let report = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            records,
            &DuplicatePolicy::SameDateAmountAndDescription,
            OWNER,
        )
        .await
        .unwrap();
    // Once a new row is found the second March 2nd coffee is not compared.
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn malformed_records_are_reported() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;

    let data = "date,description,amount\n\
                2026-03-01,Coffee,-3.50\n\
                yesterday,Broken,1.00\n\
                2026-03-03,Lunch,-12.005\n";
    let report = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            read_csv(data.as_bytes()),
            &DuplicatePolicy::None,
            OWNER,
        )
        .await
        .unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 2);
    assert!(report.error.unwrap().starts_with("Validation error: line 3:"));
}

#[tokio::test]
async fn custom_duplicate_predicate() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    unbooked(&engine, &realm_id, "checking", -100, "anything", at(2026, 3, 1)).await;

    let same_day = |existing: &UnbookedTransaction, incoming: &ImportRecord| {
        existing.datetime.date_naive() == incoming.datetime.date_naive()
    };
    let report = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            vec![Ok(ImportRecord::new(at(2026, 3, 1), -999))],
            &same_day,
            OWNER,
        )
        .await
        .unwrap();
    assert_eq!(report.imported, 0);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn import_requires_write_access() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;

    let err = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            read_csv(STATEMENT.as_bytes()),
            &DuplicatePolicy::default(),
            OTHER,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = engine
        .import_bank_transactions(
            &realm_id,
            "missing",
            Vec::new(),
            &DuplicatePolicy::default(),
            OWNER,
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("bank account missing".to_string()));
}

#[tokio::test]
async fn statement_has_a_running_balance() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    engine
        .add_bank_account(
            BankAccountCmd::new(&realm_id, OWNER, "Checking", "testbank", date(2026, 1, 1))
                .id("checking")
                .account_number("DE00 1234")
                .opening_balance(10_000),
        )
        .await
        .unwrap();
    unbooked(&engine, &realm_id, "checking", -1_000, "February", at(2026, 2, 1)).await;
    unbooked(&engine, &realm_id, "checking", -3_000, "Rent", at(2026, 3, 1)).await;
    unbooked(&engine, &realm_id, "checking", 500, "Refund", at(2026, 3, 2)).await;

    let all = engine
        .bank_account_transactions(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(|t| t.balance_in_cents).collect::<Vec<_>>(),
        vec![10_000, 9_000, 6_000, 6_500]
    );
    assert!(all[0].is_booked());
    assert_eq!(all[0].description.as_deref(), Some("Opening balance"));

    let march = DateRange::between(at(2026, 3, 1), at(2026, 4, 1));
    let lines = engine
        .bank_account_transactions(&realm_id, "checking", &march, OWNER)
        .await
        .unwrap();
    assert_eq!(
        lines.iter().map(|t| t.balance_in_cents).collect::<Vec<_>>(),
        vec![6_000, 6_500]
    );
    let balance = engine
        .bank_account_balance(&realm_id, "checking", &march, OWNER)
        .await
        .unwrap();
    assert_eq!(balance, -2_500);

    let accounts = engine.get_bank_accounts(&realm_id, OWNER).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].account_number.as_deref(), Some("DE00 1234"));
    let opening = engine
        .account_balance(&realm_id, "OpeningBalances", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(opening, -10_000);
}

#[tokio::test]
async fn closed_bank_accounts_reject_later_transactions() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;

    let err = engine
        .close_bank_account(&realm_id, "checking", date(2025, 12, 31), OWNER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    engine
        .close_bank_account(&realm_id, "checking", date(2026, 2, 28), OWNER)
        .await
        .unwrap();

    let report = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            vec![
                Ok(ImportRecord::new(at(2026, 2, 27), -100)),
                Ok(ImportRecord::new(at(2026, 3, 1), -200)),
            ],
            &DuplicatePolicy::None,
            OWNER,
        )
        .await
        .unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.error.as_deref(), Some("bank account checking is closed"));
}

#[tokio::test]
async fn storage_failure_rolls_back_and_skips_the_whole_batch() {
    let (engine, db) = engine_with_database().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    db.execute_unprepared(
        "CREATE TRIGGER disk_full BEFORE INSERT ON unbooked_bank_transactions \
         WHEN (SELECT COUNT(*) FROM unbooked_bank_transactions) >= 2 \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END",
    )
    .await
    .unwrap();

    let statement = format!("{STATEMENT}not-a-date,Broken,-1.00\n");
    let report = engine
        .import_bank_transactions(
            &realm_id,
            "checking",
            read_csv(statement.as_bytes()),
            &DuplicatePolicy::None,
            OWNER,
        )
        .await
        .unwrap();
    assert_eq!(report.imported, 0);
    assert_eq!(report.skipped, 5);
    assert!(report.error.unwrap().contains("disk full"));

    let rows = engine
        .get_unbooked_transactions(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert!(rows.is_empty());
}
