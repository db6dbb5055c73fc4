//! Bank activity that has not been turned into a booking yet.
//!
//! Rows are immutable once inserted. A row whose `matched_booking_id` is set
//! has been consumed by a matcher: it stays in the table for audit, but it
//! is no longer part of the unbooked balance or the unbooked listing.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbookedTransaction {
    pub realm_id: String,
    pub account_id: String,
    pub id: i64,
    pub memo: Option<String>,
    pub datetime: DateTime<Utc>,
    pub amount_in_cents: i64,
    pub other_account_number: Option<String>,
    pub matched_booking_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "unbooked_bank_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub realm_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub memo: Option<String>,
    pub datetime: DateTimeUtc,
    pub amount_in_cents: i64,
    pub other_account_number: Option<String>,
    pub matched_booking_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&UnbookedTransaction> for ActiveModel {
    fn from(tx: &UnbookedTransaction) -> Self {
        Self {
            realm_id: ActiveValue::Set(tx.realm_id.clone()),
            account_id: ActiveValue::Set(tx.account_id.clone()),
            id: ActiveValue::Set(tx.id),
            memo: ActiveValue::Set(tx.memo.clone()),
            datetime: ActiveValue::Set(tx.datetime),
            amount_in_cents: ActiveValue::Set(tx.amount_in_cents),
            other_account_number: ActiveValue::Set(tx.other_account_number.clone()),
            matched_booking_id: ActiveValue::Set(tx.matched_booking_id),
        }
    }
}

impl From<Model> for UnbookedTransaction {
    fn from(model: Model) -> Self {
        Self {
            realm_id: model.realm_id,
            account_id: model.account_id,
            id: model.id,
            memo: model.memo,
            datetime: model.datetime,
            amount_in_cents: model.amount_in_cents,
            other_account_number: model.other_account_number,
            matched_booking_id: model.matched_booking_id,
        }
    }
}
