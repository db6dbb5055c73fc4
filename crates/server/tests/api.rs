use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine as _;
use http_body_util::BodyExt;
use migration::MigratorTrait;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = engine::Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    engine.create_user("alice", "secret", false).await.unwrap();
    engine.create_user("bob", "secret", false).await.unwrap();
    server::app(engine, db)
}

fn basic(username: &str, password: &str) -> String {
    let secret = format!("{username}:{password}");
    format!(
        "Basic {}",
        base64::prelude::BASE64_STANDARD.encode(secret)
    )
}

async fn call(app: &Router, auth: Option<String>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }
    let request = request.body(Body::from(body.to_string())).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_realm(app: &Router) -> String {
    let (status, body) = call(
        app,
        Some(basic("alice", "secret")),
        json!({"op": "createRealm", "payload": {"name": "Household", "currency": "EUR"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "id");
    body["data"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn requests_need_valid_credentials() {
    let app = app().await;
    let op = json!({"op": "read", "payload": {"op": "getRealms"}});

    let (status, _) = call(&app, None, op.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Some(basic("alice", "wrong")), op.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Some(basic("mallory", "secret")), op.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Some(basic("alice", "secret")), op).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"type": "read", "data": {"type": "realms", "data": []}}));
}

#[tokio::test]
async fn bookings_round_trip_through_the_api() {
    let app = app().await;
    let realm_id = create_realm(&app).await;
    let alice = || Some(basic("alice", "secret"));

    let (status, body) = call(
        &app,
        alice(),
        json!({"op": "addOrReplaceAccount", "payload": {
            "realmId": realm_id,
            "accountId": "groceries",
            "name": "Groceries",
            "parentAccountId": "Expense",
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"type": "id", "data": "groceries"}));

    let (status, body) = call(
        &app,
        alice(),
        json!({"op": "addOrReplaceBooking", "payload": {
            "realmId": realm_id,
            "description": "Weekly shop",
            "datetime": "2026-03-01T12:00:00Z",
            "entries": [
                {"accountId": "groceries", "amountInCents": 4250},
                {"accountId": "Asset", "amountInCents": -4250},
            ],
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"type": "bookingId", "data": 1}));

    let (status, body) = call(
        &app,
        alice(),
        json!({"op": "read", "payload": {
            "op": "getAccountBalance",
            "realmId": realm_id,
            "accountId": "Expense",
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"type": "read", "data": {"type": "balance", "data": 4250}}));
}

#[tokio::test]
async fn engine_errors_keep_their_status() {
    let app = app().await;
    let realm_id = create_realm(&app).await;

    let (status, body) = call(
        &app,
        Some(basic("alice", "secret")),
        json!({"op": "addOrReplaceBooking", "payload": {
            "realmId": realm_id,
            "datetime": "2026-03-01T12:00:00Z",
            "entries": [{"accountId": "Asset", "amountInCents": 100}],
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().starts_with("Validation error"));

    let (status, _) = call(
        &app,
        Some(basic("bob", "secret")),
        json!({"op": "read", "payload": {"op": "getAccounts", "realmId": realm_id}}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Some(basic("alice", "secret")),
        json!({"op": "removeBooking", "payload": {"realmId": realm_id, "bookingId": 42}}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn csv_imports_report_counts() {
    let app = app().await;
    let realm_id = create_realm(&app).await;
    let alice = || Some(basic("alice", "secret"));

    let (status, _) = call(
        &app,
        alice(),
        json!({"op": "addBankAccount", "payload": {
            "realmId": realm_id,
            "accountId": "checking",
            "name": "Checking",
            "bankId": "testbank",
            "openDate": "2026-01-01",
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let import = json!({"op": "importBankTransactions", "payload": {
        "realmId": realm_id,
        "accountId": "checking",
        "records": [
            {"description": "Salary", "datetime": "2026-02-01T08:00:00Z", "amountInCents": 250000},
            {"description": "Rent", "datetime": "2026-02-02T08:00:00Z", "amountInCents": -90000},
        ],
    }});
    let (status, body) = call(&app, alice(), import.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"type": "import", "data": {"imported": 2, "skipped": 0, "error": null}})
    );

    let (_, body) = call(&app, alice(), import).await;
    assert_eq!(
        body,
        json!({"type": "import", "data": {"imported": 0, "skipped": 2, "error": null}})
    );
}
