#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{AccountCmd, BankAccountCmd, Currency, Engine, UnbookedTransactionCmd};
use migration::MigratorTrait;

pub const OWNER: &str = "alice";
pub const OTHER: &str = "bob";
pub const ADMIN: &str = "root";

pub async fn engine() -> Engine {
    engine_with_database().await.0
}

/// Engine plus a handle on its database, for tests that tamper with storage.
pub async fn engine_with_database() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();
    engine.create_user(OWNER, "password", false).await.unwrap();
    engine.create_user(OTHER, "password", false).await.unwrap();
    engine.create_user(ADMIN, "password", true).await.unwrap();
    (engine, db)
}

pub async fn realm(engine: &Engine) -> String {
    engine
        .create_realm("Household", Currency::Eur, OWNER)
        .await
        .unwrap()
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Bank account `id` opened on 2026-01-01 without an opening balance.
pub async fn bank_account(engine: &Engine, realm_id: &str, id: &str) -> String {
    engine
        .add_bank_account(
            BankAccountCmd::new(realm_id, OWNER, id, "testbank", date(2026, 1, 1)).id(id),
        )
        .await
        .unwrap()
}

/// Expense account `id` below the standard `Expense` root.
pub async fn expense(engine: &Engine, realm_id: &str, id: &str) -> String {
    engine
        .add_or_replace_account(AccountCmd::new(realm_id, OWNER, id, "Expense").id(id))
        .await
        .unwrap()
}

pub async fn unbooked(
    engine: &Engine,
    realm_id: &str,
    account_id: &str,
    amount_in_cents: i64,
    memo: &str,
    datetime: DateTime<Utc>,
) -> i64 {
    engine
        .add_unbooked_transaction(
            UnbookedTransactionCmd::new(realm_id, OWNER, account_id, amount_in_cents, datetime)
                .memo(memo),
        )
        .await
        .unwrap()
}
