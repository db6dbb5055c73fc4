//! Rows of `booking_entries`, keyed by `(realm_id, booking_id, id)`.

use sea_orm::{ActiveValue, entity::prelude::*};

use crate::BookingEntry;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "booking_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub realm_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub booking_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub description: Option<String>,
    pub account_id: String,
    pub amount_in_cents: i64,
    pub checked: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn from_entry(realm_id: &str, booking_id: i64, entry: &BookingEntry) -> Self {
        Self {
            realm_id: ActiveValue::Set(realm_id.to_string()),
            booking_id: ActiveValue::Set(booking_id),
            id: ActiveValue::Set(entry.id),
            description: ActiveValue::Set(entry.description.clone()),
            account_id: ActiveValue::Set(entry.account_id.clone()),
            amount_in_cents: ActiveValue::Set(entry.amount_in_cents),
            checked: ActiveValue::Set(entry.checked),
        }
    }
}

impl From<Model> for BookingEntry {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            description: model.description,
            account_id: model.account_id,
            amount_in_cents: model.amount_in_cents,
            checked: model.checked,
        }
    }
}
