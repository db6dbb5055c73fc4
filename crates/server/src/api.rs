//! Write and read operations over `POST /api`.
//!
//! Every request carries one [`Operation`]; the acting user always comes
//! from the authenticated session, never from the payload.

use axum::{Extension, Json, extract::State};
use chrono::{DateTime, NaiveDate, Utc};
use engine::{
    AccessLevel, AccountCmd, ActionExpr, BankAccountCmd, BookingCmd, BookingEntry, Currency,
    DuplicatePolicy, FilterExpr, ImportRecord, ImportReport, MatcherCmd, ReadRequest,
    ReadResponse, UnbookedTransactionCmd,
};
use serde::{Deserialize, Serialize};

use crate::{ServerError, server::ServerState, user};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmPayload {
    #[serde(default)]
    pub realm_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmAccessPayload {
    pub realm_id: String,
    pub user_id: String,
    pub access_level: AccessLevel,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPayload {
    pub realm_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub parent_account_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAccountPayload {
    pub realm_id: String,
    pub source_account_id: String,
    pub target_account_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub realm_id: String,
    #[serde(default)]
    pub booking_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    pub datetime: DateTime<Utc>,
    pub entries: Vec<BookingEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBookingPayload {
    pub realm_id: String,
    pub booking_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountPayload {
    pub realm_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    pub name: String,
    pub bank_id: String,
    #[serde(default)]
    pub account_number: Option<String>,
    pub open_date: NaiveDate,
    #[serde(default)]
    pub liability: bool,
    #[serde(default)]
    pub opening_balance: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseBankAccountPayload {
    pub realm_id: String,
    pub account_id: String,
    pub close_date: NaiveDate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbookedTransactionPayload {
    pub realm_id: String,
    pub account_id: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub datetime: DateTime<Utc>,
    pub amount_in_cents: i64,
    #[serde(default)]
    pub other_account_number: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveUnbookedTransactionPayload {
    pub realm_id: String,
    pub account_id: String,
    pub transaction_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherPayload {
    pub realm_id: String,
    #[serde(default)]
    pub matcher_id: Option<String>,
    pub name: String,
    pub filter: FilterExpr,
    pub action: ActionExpr,
    #[serde(default)]
    pub action_account_id: Option<String>,
    #[serde(default)]
    pub action_memo: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMatcherPayload {
    pub realm_id: String,
    pub matcher_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteMatcherPayload {
    pub realm_id: String,
    pub account_id: String,
    pub transaction_id: i64,
    pub matcher_id: String,
}

/// Bank rows to import, either as parsed records or as generic CSV text.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    pub realm_id: String,
    pub account_id: String,
    #[serde(default)]
    pub records: Vec<ImportRecord>,
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub policy: DuplicatePolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "camelCase")]
pub enum Operation {
    CreateRealm(RealmPayload),
    UpdateRealm(RealmPayload),
    SetRealmAccess(RealmAccessPayload),
    AddOrReplaceAccount(AccountPayload),
    MergeAccount(MergeAccountPayload),
    AddOrReplaceBooking(BookingPayload),
    RemoveBooking(RemoveBookingPayload),
    AddBankAccount(BankAccountPayload),
    CloseBankAccount(CloseBankAccountPayload),
    AddUnbookedTransaction(UnbookedTransactionPayload),
    RemoveUnbookedTransaction(RemoveUnbookedTransactionPayload),
    AddOrReplaceUnbookedTransactionMatcher(MatcherPayload),
    RemoveUnbookedTransactionMatcher(RemoveMatcherPayload),
    ExecuteMatcherUnbookedTransactionMatcher(ExecuteMatcherPayload),
    ImportBankTransactions(ImportPayload),
    Read(ReadRequest),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum OperationResult {
    Done,
    Id(String),
    BookingId(i64),
    BookingIds(Vec<i64>),
    TransactionId(i64),
    Import(ImportReport),
    Read(ReadResponse),
}

/// Handle one operation on behalf of the authenticated user.
pub async fn handle(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(operation): Json<Operation>,
) -> Result<Json<OperationResult>, ServerError> {
    let engine = &state.engine;
    let user_id = user.username.as_str();

    let result = match operation {
        Operation::CreateRealm(payload) => {
            let realm_id = engine
                .create_realm(&payload.name, payload.currency, user_id)
                .await?;
            OperationResult::Id(realm_id)
        }
        Operation::UpdateRealm(payload) => {
            let Some(realm_id) = payload.realm_id else {
                return Err(ServerError::Generic("realmId required".to_string()));
            };
            engine
                .update_realm(&realm_id, &payload.name, payload.currency, user_id)
                .await?;
            OperationResult::Done
        }
        Operation::SetRealmAccess(payload) => {
            engine
                .set_realm_access(
                    &payload.realm_id,
                    &payload.user_id,
                    payload.access_level,
                    user_id,
                )
                .await?;
            OperationResult::Done
        }
        Operation::AddOrReplaceAccount(payload) => {
            let mut cmd = AccountCmd::new(
                payload.realm_id,
                user_id,
                payload.name,
                payload.parent_account_id,
            );
            cmd.account_id = payload.account_id;
            cmd.description = payload.description;
            OperationResult::Id(engine.add_or_replace_account(cmd).await?)
        }
        Operation::MergeAccount(payload) => {
            engine
                .merge_account(
                    &payload.realm_id,
                    &payload.source_account_id,
                    &payload.target_account_id,
                    user_id,
                )
                .await?;
            OperationResult::Done
        }
        Operation::AddOrReplaceBooking(payload) => {
            let mut cmd = BookingCmd::new(payload.realm_id, user_id, payload.datetime)
                .entries(payload.entries);
            cmd.booking_id = payload.booking_id;
            cmd.description = payload.description;
            OperationResult::BookingId(engine.add_or_replace_booking(cmd).await?)
        }
        Operation::RemoveBooking(payload) => {
            engine
                .remove_booking(&payload.realm_id, payload.booking_id, user_id)
                .await?;
            OperationResult::Done
        }
        Operation::AddBankAccount(payload) => {
            let mut cmd = BankAccountCmd::new(
                payload.realm_id,
                user_id,
                payload.name,
                payload.bank_id,
                payload.open_date,
            )
            .opening_balance(payload.opening_balance);
            cmd.account_id = payload.account_id;
            cmd.account_number = payload.account_number;
            cmd.liability = payload.liability;
            OperationResult::Id(engine.add_bank_account(cmd).await?)
        }
        Operation::CloseBankAccount(payload) => {
            engine
                .close_bank_account(
                    &payload.realm_id,
                    &payload.account_id,
                    payload.close_date,
                    user_id,
                )
                .await?;
            OperationResult::Done
        }
        Operation::AddUnbookedTransaction(payload) => {
            let mut cmd = UnbookedTransactionCmd::new(
                payload.realm_id,
                user_id,
                payload.account_id,
                payload.amount_in_cents,
                payload.datetime,
            );
            cmd.memo = payload.memo;
            cmd.other_account_number = payload.other_account_number;
            OperationResult::TransactionId(engine.add_unbooked_transaction(cmd).await?)
        }
        Operation::RemoveUnbookedTransaction(payload) => {
            engine
                .remove_unbooked_transaction(
                    &payload.realm_id,
                    &payload.account_id,
                    payload.transaction_id,
                    user_id,
                )
                .await?;
            OperationResult::Done
        }
        Operation::AddOrReplaceUnbookedTransactionMatcher(payload) => {
            let mut cmd = MatcherCmd::new(
                payload.realm_id,
                user_id,
                payload.name,
                payload.filter,
                payload.action,
            );
            cmd.matcher_id = payload.matcher_id;
            cmd.action_account_id = payload.action_account_id;
            cmd.action_memo = payload.action_memo;
            OperationResult::Id(engine.add_or_replace_matcher(cmd).await?)
        }
        Operation::RemoveUnbookedTransactionMatcher(payload) => {
            engine
                .remove_matcher(&payload.realm_id, &payload.matcher_id, user_id)
                .await?;
            OperationResult::Done
        }
        Operation::ExecuteMatcherUnbookedTransactionMatcher(payload) => {
            let booking_ids = engine
                .execute_matcher(
                    &payload.realm_id,
                    &payload.account_id,
                    payload.transaction_id,
                    &payload.matcher_id,
                    user_id,
                )
                .await?;
            OperationResult::BookingIds(booking_ids)
        }
        Operation::ImportBankTransactions(payload) => {
            let mut records: Vec<_> = payload.records.into_iter().map(Ok).collect();
            if let Some(csv) = payload.csv {
                records.extend(engine::read_csv(csv.as_bytes()));
            }
            let report = engine
                .import_bank_transactions(
                    &payload.realm_id,
                    &payload.account_id,
                    records,
                    &payload.policy,
                    user_id,
                )
                .await?;
            OperationResult::Import(report)
        }
        Operation::Read(request) => OperationResult::Read(engine.read(&request, user_id).await?),
    };

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_use_op_and_payload() {
        let raw = r#"{"op":"removeBooking","payload":{"realmId":"r1","bookingId":3}}"#;
        let operation: Operation = serde_json::from_str(raw).unwrap();
        let Operation::RemoveBooking(payload) = operation else {
            panic!("unexpected operation {operation:?}");
        };
        assert_eq!(payload.realm_id, "r1");
        assert_eq!(payload.booking_id, 3);
    }

    #[test]
    fn reads_nest_their_request() {
        let raw = r#"{"op":"read","payload":{"op":"getAccounts","realmId":"r1"}}"#;
        let operation: Operation = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            operation,
            Operation::Read(ReadRequest::GetAccounts { realm_id }) if realm_id == "r1"
        ));
    }

    #[test]
    fn import_defaults_to_description_aware_dedup() {
        let raw = r#"{"op":"importBankTransactions","payload":{"realmId":"r1","accountId":"checking"}}"#;
        let operation: Operation = serde_json::from_str(raw).unwrap();
        let Operation::ImportBankTransactions(payload) = operation else {
            panic!("unexpected operation {operation:?}");
        };
        assert!(payload.records.is_empty());
        assert_eq!(payload.policy, DuplicatePolicy::SameDateAmountAndDescription);
    }

    #[test]
    fn results_are_tagged() {
        let json = serde_json::to_value(OperationResult::BookingId(7)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "bookingId", "data": 7}));
        let json = serde_json::to_value(OperationResult::Done).unwrap();
        assert_eq!(json, serde_json::json!({"type": "done"}));
    }
}
