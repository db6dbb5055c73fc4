mod common;

use engine::{AccessLevel, BookingCmd, Currency, EngineError};

use common::{ADMIN, OTHER, OWNER, at, engine, expense, realm};

#[tokio::test]
async fn access_levels_gate_reads_and_writes() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    expense(&engine, &realm_id, "groceries").await;
    let booking = || {
        BookingCmd::new(&realm_id, OTHER, at(2026, 3, 1))
            .entry("groceries", 100)
            .entry("Asset", -100)
    };

    let err = engine.get_accounts(&realm_id, OTHER).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    engine
        .set_realm_access(&realm_id, OTHER, AccessLevel::Read, OWNER)
        .await
        .unwrap();
    assert!(!engine.get_accounts(&realm_id, OTHER).await.unwrap().is_empty());
    let err = engine.add_or_replace_booking(booking()).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    engine
        .set_realm_access(&realm_id, OTHER, AccessLevel::Write, OWNER)
        .await
        .unwrap();
    engine.add_or_replace_booking(booking()).await.unwrap();

    // Writers cannot hand out access.
    let err = engine
        .set_realm_access(&realm_id, OTHER, AccessLevel::Owner, OTHER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
    let err = engine
        .update_realm(&realm_id, "Renamed", Currency::Usd, OTHER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    engine
        .set_realm_access(&realm_id, OTHER, AccessLevel::None, OWNER)
        .await
        .unwrap();
    assert_eq!(
        engine.access_level(&realm_id, OTHER).await.unwrap(),
        AccessLevel::None
    );
    let err = engine.get_bookings(&realm_id, &[], None, OTHER).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[tokio::test]
async fn admin_access_is_implied() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;

    assert_eq!(
        engine.access_level(&realm_id, ADMIN).await.unwrap(),
        AccessLevel::Admin
    );
    expense(&engine, &realm_id, "groceries").await;
    engine
        .add_or_replace_booking(
            BookingCmd::new(&realm_id, ADMIN, at(2026, 3, 1))
                .entry("groceries", 100)
                .entry("Asset", -100),
        )
        .await
        .unwrap();

    let err = engine
        .set_realm_access(&realm_id, OTHER, AccessLevel::Admin, OWNER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Unknown realms are only revealed as missing to admins.
    let err = engine.get_accounts("nowhere", ADMIN).await.unwrap_err();
    assert_eq!(err, EngineError::NotFound("realm nowhere".to_string()));
    let err = engine.get_accounts("nowhere", OWNER).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[tokio::test]
async fn realm_list_follows_access_changes() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;

    assert!(engine.get_realms(OTHER).await.unwrap().is_empty());
    engine
        .set_realm_access(&realm_id, OTHER, AccessLevel::Read, OWNER)
        .await
        .unwrap();
    let realms = engine.get_realms(OTHER).await.unwrap();
    assert_eq!(realms.len(), 1);
    assert_eq!(realms[0].id, realm_id);
    assert_eq!(realms[0].access_level, AccessLevel::Read);

    engine
        .update_realm(&realm_id, "Holiday home", Currency::Chf, OWNER)
        .await
        .unwrap();
    let realms = engine.get_realms(OTHER).await.unwrap();
    assert_eq!(realms[0].name, "Holiday home");
    assert_eq!(realms[0].currency, Currency::Chf);

    let second = engine
        .create_realm("Business", Currency::Usd, OTHER)
        .await
        .unwrap();
    let names: Vec<String> = engine
        .get_realms(OTHER)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Business", "Holiday home"]);

    let admin_view = engine.get_realms(ADMIN).await.unwrap();
    assert_eq!(admin_view.len(), 2);
    assert!(admin_view.iter().all(|r| r.access_level == AccessLevel::Admin));
    assert_eq!(
        engine.access_level(&second, OTHER).await.unwrap(),
        AccessLevel::Owner
    );
}

#[tokio::test]
async fn users_are_unique() {
    let engine = engine().await;
    let err = engine.create_user(OWNER, "again", false).await.unwrap_err();
    assert_eq!(err, EngineError::ExistingKey(OWNER.to_string()));
    let err = engine
        .create_realm("Nobody's", Currency::Eur, "ghost")
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("user ghost".to_string()));
}

#[tokio::test]
async fn cached_realm_list_carries_no_booking_counter() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    expense(&engine, &realm_id, "groceries").await;
    let before = engine.get_realms(OWNER).await.unwrap();

    engine
        .add_or_replace_booking(
            BookingCmd::new(&realm_id, OWNER, at(2026, 3, 1))
                .entry("groceries", 100)
                .entry("Asset", -100),
        )
        .await
        .unwrap();
    assert_eq!(engine.get_realms(OWNER).await.unwrap(), before);

    let json = serde_json::to_value(&before[0]).unwrap();
    assert_eq!(json["id"], realm_id.as_str());
    assert_eq!(json["accessLevel"], "owner");
    assert!(json.get("lastBookingId").is_none());
}
