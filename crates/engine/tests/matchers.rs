mod common;

use engine::{
    AccountCmd, BookingEntry, BookingFilter, ControlAccountType, DateRange, EngineError,
    FilterExpr, MatcherCmd,
};

use common::{OWNER, at, bank_account, engine, expense, realm, unbooked};

fn amounts(entries: &[BookingEntry]) -> Vec<(&str, i64)> {
    let mut amounts: Vec<(&str, i64)> = entries
        .iter()
        .map(|e| (e.account_id.as_str(), e.amount_in_cents))
        .collect();
    amounts.sort_unstable();
    amounts
}

#[tokio::test]
async fn payable_action_books_through_the_control_account() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    expense(&engine, &realm_id, "groceries").await;
    let tx_id = unbooked(&engine, &realm_id, "checking", -5000, "Store X", at(2026, 3, 3)).await;

    let matcher_id = engine
        .add_or_replace_matcher(MatcherCmd::account_action(
            &realm_id,
            OWNER,
            "Store X",
            FilterExpr::contains("Store X"),
            ControlAccountType::Payable,
            "groceries",
        ))
        .await
        .unwrap();
    let booking_ids = engine
        .execute_matcher(&realm_id, "checking", tx_id, &matcher_id, OWNER)
        .await
        .unwrap();
    assert_eq!(booking_ids.len(), 2);

    let paid = engine
        .get_booking(&realm_id, booking_ids[0], OWNER)
        .await
        .unwrap();
    assert_eq!(
        amounts(&paid.entries),
        vec![("AccountPayable", 5000), ("checking", -5000)]
    );
    assert_eq!(paid.description.as_deref(), Some("Store X"));
    let categorized = engine
        .get_booking(&realm_id, booking_ids[1], OWNER)
        .await
        .unwrap();
    assert_eq!(
        amounts(&categorized.entries),
        vec![("AccountPayable", -5000), ("groceries", 5000)]
    );

    let pending = engine
        .get_unbooked_transactions(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert!(pending.is_empty());
    let control = engine
        .account_balance(&realm_id, "AccountPayable", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(control, 0);
    let bank = engine
        .bank_account_balance(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(bank, -5000);

    let matchers = engine.get_matchers(&realm_id, OWNER).await.unwrap();
    assert!(matchers[0].last_used.is_some());

    let err = engine
        .execute_matcher(&realm_id, "checking", tx_id, &matcher_id, OWNER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

#[tokio::test]
async fn party_control_account_is_created_on_first_use() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    engine
        .add_or_replace_account(AccountCmd::new(&realm_id, OWNER, "Acme", "Parties").id("acme"))
        .await
        .unwrap();
    engine
        .add_or_replace_account(AccountCmd::new(&realm_id, OWNER, "Consulting", "Income").id("consulting"))
        .await
        .unwrap();

    let matcher_id = engine
        .add_or_replace_matcher(
            MatcherCmd::account_action(
                &realm_id,
                OWNER,
                "Acme invoices",
                FilterExpr::StartsWith {
                    value: "invoice".to_string(),
                },
                ControlAccountType::Receivable,
                "consulting",
            )
            .action_account("acme")
            .action_memo("Acme payment"),
        )
        .await
        .unwrap();

    for (day, amount) in [(3, 1000), (4, 2500)] {
        let tx_id = unbooked(&engine, &realm_id, "checking", amount, "Invoice 17", at(2026, 3, day)).await;
        let ids = engine
            .execute_matcher(&realm_id, "checking", tx_id, &matcher_id, OWNER)
            .await
            .unwrap();
        let paid = engine.get_booking(&realm_id, ids[0], OWNER).await.unwrap();
        assert_eq!(
            amounts(&paid.entries),
            vec![("AccountReceivable:acme", -amount), ("checking", amount)]
        );
        assert_eq!(paid.description.as_deref(), Some("Acme payment"));
    }

    let accounts = engine.get_accounts(&realm_id, OWNER).await.unwrap();
    let control = accounts
        .iter()
        .find(|a| a.id == "AccountReceivable:acme")
        .unwrap();
    assert_eq!(control.parent_account_id.as_deref(), Some("AccountReceivable"));
    let income = engine
        .account_balance(&realm_id, "consulting", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(income, -3500);
}

#[tokio::test]
async fn split_overshoot_is_rejected_without_side_effects() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    expense(&engine, &realm_id, "groceries").await;
    expense(&engine, &realm_id, "snacks").await;
    engine
        .add_or_replace_account(AccountCmd::new(&realm_id, OWNER, "Store", "Parties").id("store"))
        .await
        .unwrap();
    let tx_id = unbooked(&engine, &realm_id, "checking", -5000, "Store X", at(2026, 3, 3)).await;

    let matcher_id = engine
        .add_or_replace_matcher(
            MatcherCmd::account_action(
                &realm_id,
                OWNER,
                "Store X",
                FilterExpr::contains("store"),
                ControlAccountType::Payable,
                "groceries",
            )
            .action_account("store")
            .split("snacks", 6000),
        )
        .await
        .unwrap();
    let err = engine
        .execute_matcher(&realm_id, "checking", tx_id, &matcher_id, OWNER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let bookings = engine
        .get_bookings(&realm_id, &[], None, OWNER)
        .await
        .unwrap();
    assert!(bookings.is_empty());
    let pending = engine
        .get_unbooked_transactions(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    let accounts = engine.get_accounts(&realm_id, OWNER).await.unwrap();
    assert!(!accounts.iter().any(|a| a.id == "AccountPayable:store"));
}

#[tokio::test]
async fn oversized_splits_are_rejected_instead_of_overflowing() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    expense(&engine, &realm_id, "groceries").await;
    expense(&engine, &realm_id, "a").await;
    expense(&engine, &realm_id, "b").await;
    engine
        .add_or_replace_account(AccountCmd::new(&realm_id, OWNER, "Store", "Parties").id("store"))
        .await
        .unwrap();
    let tx_id = unbooked(&engine, &realm_id, "checking", -5000, "Store X", at(2026, 3, 3)).await;

    let matcher_id = engine
        .add_or_replace_matcher(
            MatcherCmd::account_action(
                &realm_id,
                OWNER,
                "Store X",
                FilterExpr::contains("store"),
                ControlAccountType::Payable,
                "groceries",
            )
            .action_account("store")
            .split("a", i64::MAX)
            .split("b", i64::MAX),
        )
        .await
        .unwrap();
    let err = engine
        .execute_matcher(&realm_id, "checking", tx_id, &matcher_id, OWNER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let bookings = engine
        .get_bookings(&realm_id, &[], None, OWNER)
        .await
        .unwrap();
    assert!(bookings.is_empty());
    let pending = engine
        .get_unbooked_transactions(&realm_id, "checking", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn splits_share_the_amount_with_the_main_account() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    expense(&engine, &realm_id, "groceries").await;
    expense(&engine, &realm_id, "snacks").await;
    let tx_id = unbooked(&engine, &realm_id, "checking", -5000, "Store X", at(2026, 3, 3)).await;

    let matcher_id = engine
        .add_or_replace_matcher(
            MatcherCmd::account_action(
                &realm_id,
                OWNER,
                "Store X",
                FilterExpr::contains("store"),
                ControlAccountType::Payable,
                "groceries",
            )
            .split("snacks", 1500),
        )
        .await
        .unwrap();
    let ids = engine
        .execute_matcher(&realm_id, "checking", tx_id, &matcher_id, OWNER)
        .await
        .unwrap();
    let categorized = engine.get_booking(&realm_id, ids[1], OWNER).await.unwrap();
    assert_eq!(
        amounts(&categorized.entries),
        vec![("AccountPayable", -5000), ("groceries", 3500), ("snacks", 1500)]
    );
}

#[tokio::test]
async fn transfer_between_bank_accounts_consumes_both_sides() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    bank_account(&engine, &realm_id, "savings").await;
    let out_id = unbooked(&engine, &realm_id, "checking", -2000, "To savings", at(2026, 3, 3)).await;
    unbooked(&engine, &realm_id, "savings", 2000, "From checking", at(2026, 3, 3)).await;
    unbooked(&engine, &realm_id, "savings", 2000, "Other day", at(2026, 3, 4)).await;

    let matcher_id = engine
        .add_or_replace_matcher(MatcherCmd::transfer(
            &realm_id,
            OWNER,
            "Savings",
            FilterExpr::contains("savings"),
            "savings",
        ))
        .await
        .unwrap();
    let ids = engine
        .execute_matcher(&realm_id, "checking", out_id, &matcher_id, OWNER)
        .await
        .unwrap();
    let booking = engine.get_booking(&realm_id, ids[0], OWNER).await.unwrap();
    assert_eq!(
        amounts(&booking.entries),
        vec![("checking", -2000), ("savings", 2000)]
    );

    let savings_pending = engine
        .get_unbooked_transactions(&realm_id, "savings", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(savings_pending.len(), 1);
    assert_eq!(savings_pending[0].memo.as_deref(), Some("Other day"));
    let savings = engine
        .bank_account_balance(&realm_id, "savings", &DateRange::all(), OWNER)
        .await
        .unwrap();
    assert_eq!(savings, 4000);
}

#[tokio::test]
async fn candidates_and_stale_execution() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    bank_account(&engine, &realm_id, "checking").await;
    expense(&engine, &realm_id, "groceries").await;
    expense(&engine, &realm_id, "fuel").await;
    let tx_id = unbooked(&engine, &realm_id, "checking", -4200, "STORE X Berlin", at(2026, 3, 3)).await;

    let store = engine
        .add_or_replace_matcher(MatcherCmd::transfer(
            &realm_id,
            OWNER,
            "Store",
            FilterExpr::And {
                filters: vec![
                    FilterExpr::contains("store x"),
                    FilterExpr::AmountBetween {
                        from: -10_000,
                        to: 0,
                    },
                ],
            },
            "groceries",
        ))
        .await
        .unwrap();
    let fuel = engine
        .add_or_replace_matcher(MatcherCmd::transfer(
            &realm_id,
            OWNER,
            "Fuel",
            FilterExpr::contains("petrol"),
            "fuel",
        ))
        .await
        .unwrap();

    let candidates = engine
        .matching_matchers(&realm_id, "checking", tx_id, OWNER)
        .await
        .unwrap();
    assert_eq!(
        candidates.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
        vec![store.as_str()]
    );

    let err = engine
        .execute_matcher(&realm_id, "checking", tx_id, &fuel, OWNER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));

    engine
        .execute_matcher(&realm_id, "checking", tx_id, &store, OWNER)
        .await
        .unwrap();
    let candidates = engine
        .matching_matchers(&realm_id, "checking", tx_id, OWNER)
        .await
        .unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn malformed_matchers_are_rejected() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    expense(&engine, &realm_id, "groceries").await;

    let no_target = MatcherCmd::new(
        &realm_id,
        OWNER,
        "No target",
        FilterExpr::contains("x"),
        engine::ActionExpr::Transfer,
    );
    let err = engine.add_or_replace_matcher(no_target).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let empty_filter = MatcherCmd::transfer(
        &realm_id,
        OWNER,
        "Empty",
        FilterExpr::contains(""),
        "groceries",
    );
    let err = engine.add_or_replace_matcher(empty_filter).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let not_a_party = MatcherCmd::account_action(
        &realm_id,
        OWNER,
        "Not a party",
        FilterExpr::contains("x"),
        ControlAccountType::Payable,
        "groceries",
    )
    .action_account("groceries");
    let err = engine.add_or_replace_matcher(not_a_party).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let unknown_main = MatcherCmd::account_action(
        &realm_id,
        OWNER,
        "Unknown",
        FilterExpr::contains("x"),
        ControlAccountType::Payable,
        "missing",
    );
    let err = engine.add_or_replace_matcher(unknown_main).await.unwrap_err();
    assert_eq!(err, EngineError::NotFound("account missing".to_string()));

    assert!(engine.get_matchers(&realm_id, OWNER).await.unwrap().is_empty());
    let bookings = engine
        .get_bookings(&realm_id, &[BookingFilter::Ascending], None, OWNER)
        .await
        .unwrap();
    assert!(bookings.is_empty());
}
