//! Bank accounts.
//!
//! A [`BankAccount`] extends exactly one [`Account`](crate::Account) with the
//! bank's identifiers and the counter that numbers its unbooked transactions.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub account_id: String,
    pub realm_id: String,
    pub bank_id: String,
    pub account_number: Option<String>,
    pub open_date: NaiveDate,
    pub close_date: Option<NaiveDate>,
    /// Last unbooked transaction id handed out. Only ever increments.
    pub last_unbooked_transaction_id: i64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bank_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub realm_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    pub bank_id: String,
    pub account_number: Option<String>,
    pub open_date: Date,
    pub close_date: Option<Date>,
    pub last_unbooked_transaction_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BankAccount> for ActiveModel {
    fn from(bank_account: &BankAccount) -> Self {
        Self {
            realm_id: ActiveValue::Set(bank_account.realm_id.clone()),
            account_id: ActiveValue::Set(bank_account.account_id.clone()),
            bank_id: ActiveValue::Set(bank_account.bank_id.clone()),
            account_number: ActiveValue::Set(bank_account.account_number.clone()),
            open_date: ActiveValue::Set(bank_account.open_date),
            close_date: ActiveValue::Set(bank_account.close_date),
            last_unbooked_transaction_id: ActiveValue::Set(
                bank_account.last_unbooked_transaction_id,
            ),
        }
    }
}

impl From<Model> for BankAccount {
    fn from(model: Model) -> Self {
        Self {
            account_id: model.account_id,
            realm_id: model.realm_id,
            bank_id: model.bank_id,
            account_number: model.account_number,
            open_date: model.open_date,
            close_date: model.close_date,
            last_unbooked_transaction_id: model.last_unbooked_transaction_id,
        }
    }
}
