//! Unbooked bank transaction matchers.
//!
//! Filter and action expressions are stored as JSON text next to the
//! matcher's scalar columns.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{ActionExpr, EngineError, FilterExpr};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbookedBankTransactionMatcher {
    pub id: String,
    pub realm_id: String,
    pub name: String,
    pub filter: FilterExpr,
    pub action: ActionExpr,
    /// Target of a `Transfer`, or the party of an `AccountAction`.
    pub action_account_id: Option<String>,
    pub action_memo: Option<String>,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "unbooked_bank_transaction_matchers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub realm_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub filter: String,
    pub action: String,
    pub action_account_id: Option<String>,
    pub action_memo: Option<String>,
    pub last_used: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&UnbookedBankTransactionMatcher> for ActiveModel {
    type Error = EngineError;

    fn try_from(matcher: &UnbookedBankTransactionMatcher) -> Result<Self, Self::Error> {
        Ok(Self {
            realm_id: ActiveValue::Set(matcher.realm_id.clone()),
            id: ActiveValue::Set(matcher.id.clone()),
            name: ActiveValue::Set(matcher.name.clone()),
            filter: ActiveValue::Set(serde_json::to_string(&matcher.filter)?),
            action: ActiveValue::Set(serde_json::to_string(&matcher.action)?),
            action_account_id: ActiveValue::Set(matcher.action_account_id.clone()),
            action_memo: ActiveValue::Set(matcher.action_memo.clone()),
            last_used: ActiveValue::Set(matcher.last_used),
        })
    }
}

impl TryFrom<Model> for UnbookedBankTransactionMatcher {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            filter: serde_json::from_str(&model.filter)?,
            action: serde_json::from_str(&model.action)?,
            id: model.id,
            realm_id: model.realm_id,
            name: model.name,
            action_account_id: model.action_account_id,
            action_memo: model.action_memo,
            last_used: model.last_used,
        })
    }
}
