mod common;

use std::time::Duration;

use engine::{BookingCmd, Currency, EngineError, Push, ReadRequest, ReadResponse};
use tokio::{sync::mpsc, time::timeout};

use common::{OTHER, OWNER, at, engine, expense, realm};

async fn next(rx: &mut mpsc::UnboundedReceiver<Push>) -> Push {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no push in time")
        .expect("channel closed")
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Push>) {
    assert!(timeout(Duration::from_millis(200), rx.recv()).await.is_err());
}

fn account_count(push: &Push) -> usize {
    match &push.result {
        Some(ReadResponse::Accounts(accounts)) => accounts.len(),
        other => panic!("unexpected push {other:?}"),
    }
}

#[tokio::test]
async fn subscription_gets_initial_and_change_pushes() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    engine
        .subscribe(
            "accounts",
            ReadRequest::GetAccounts {
                realm_id: realm_id.clone(),
            },
            OWNER,
            "session-1",
            tx,
        )
        .await
        .unwrap();
    let initial = next(&mut rx).await;
    assert_eq!(initial.subscription_id, "accounts");
    let standard = account_count(&initial);

    expense(&engine, &realm_id, "groceries").await;
    let changed = next(&mut rx).await;
    assert_eq!(account_count(&changed), standard + 1);

    // Unrelated events do not re-run the read.
    engine
        .add_or_replace_booking(
            BookingCmd::new(&realm_id, OWNER, at(2026, 3, 1))
                .entry("groceries", 100)
                .entry("Asset", -100),
        )
        .await
        .unwrap();
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn last_push_after_a_burst_of_writes_is_current() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine
        .subscribe(
            "accounts",
            ReadRequest::GetAccounts {
                realm_id: realm_id.clone(),
            },
            OWNER,
            "session-1",
            tx,
        )
        .await
        .unwrap();
    let standard = account_count(&next(&mut rx).await);

    for i in 0..10 {
        expense(&engine, &realm_id, &format!("category-{i}")).await;
    }

    let mut counts = vec![account_count(&next(&mut rx).await)];
    while let Ok(Some(push)) = timeout(Duration::from_millis(300), rx.recv()).await {
        counts.push(account_count(&push));
    }
    assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{counts:?}");
    assert_eq!(counts.last(), Some(&(standard + 10)));
}

#[tokio::test]
async fn rolled_back_writes_notify_nobody() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    expense(&engine, &realm_id, "groceries").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine
        .subscribe(
            "bookings",
            ReadRequest::GetBookings {
                realm_id: realm_id.clone(),
                filters: Vec::new(),
                limit: None,
            },
            OWNER,
            "session-1",
            tx,
        )
        .await
        .unwrap();
    next(&mut rx).await;

    let err = engine
        .add_or_replace_booking(
            BookingCmd::new(&realm_id, OWNER, at(2026, 3, 1))
                .entry("groceries", 100)
                .entry("missing", -100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn pushes_stay_inside_their_realm() {
    let engine = engine().await;
    let home = realm(&engine).await;
    let work = engine
        .create_realm("Work", Currency::Eur, OWNER)
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine
        .subscribe(
            "work-accounts",
            ReadRequest::GetAccounts { realm_id: work },
            OWNER,
            "session-1",
            tx,
        )
        .await
        .unwrap();
    next(&mut rx).await;

    expense(&engine, &home, "groceries").await;
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn realm_list_subscription_sees_new_realms() {
    let engine = engine().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine
        .subscribe("realms", ReadRequest::GetRealms, OWNER, "session-1", tx)
        .await
        .unwrap();
    let initial = next(&mut rx).await;
    assert_eq!(initial.result, Some(ReadResponse::Realms(Vec::new())));

    let realm_id = realm(&engine).await;
    let push = next(&mut rx).await;
    let Some(ReadResponse::Realms(realms)) = push.result else {
        panic!("unexpected push {push:?}");
    };
    assert_eq!(realms.len(), 1);
    assert_eq!(realms[0].id, realm_id);
}

#[tokio::test]
async fn subscriptions_need_read_access() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let err = engine
        .subscribe(
            "spy",
            ReadRequest::GetAccounts { realm_id },
            OTHER,
            "session-2",
            tx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
    assert!(engine.notifier().is_empty());
}

#[tokio::test]
async fn closed_sessions_are_dropped() {
    let engine = engine().await;
    let realm_id = realm(&engine).await;
    let request = ReadRequest::GetAccounts {
        realm_id: realm_id.clone(),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    engine
        .subscribe("a", request.clone(), OWNER, "session-1", tx.clone())
        .await
        .unwrap();
    engine
        .subscribe("b", request.clone(), OWNER, "session-1", tx)
        .await
        .unwrap();
    next(&mut rx).await;
    next(&mut rx).await;
    assert_eq!(engine.unsubscribe_session("session-1"), 2);
    assert!(engine.notifier().is_empty());

    let (tx, rx) = mpsc::unbounded_channel();
    engine
        .subscribe("c", request, OWNER, "session-2", tx)
        .await
        .unwrap();
    drop(rx);
    expense(&engine, &realm_id, "groceries").await;
    for _ in 0..50 {
        if engine.notifier().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(engine.notifier().is_empty());
    assert!(!engine.unsubscribe("c"));
}
