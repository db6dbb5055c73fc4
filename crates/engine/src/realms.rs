//! A `Realm` is a set of books: it owns an account tree, bookings, bank
//! accounts and matchers. Nothing is shared across realms.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{AccessLevel, Currency, EngineError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Realm {
    pub id: String,
    pub name: String,
    pub currency: Currency,
    /// Last booking id handed out. Only ever increments.
    pub last_booking_id: i64,
}

/// A realm as seen by one user. Realm lists are cached until the next
/// `RealmChanged`, so the booking id counter is left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmView {
    pub id: String,
    pub name: String,
    pub currency: Currency,
    pub access_level: AccessLevel,
}

impl RealmView {
    pub fn new(realm: Realm, access_level: AccessLevel) -> Self {
        Self {
            id: realm.id,
            name: realm.name,
            currency: realm.currency,
            access_level,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "realms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub currency: String,
    pub last_booking_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::realm_access::Entity")]
    RealmAccess,
}

impl Related<super::realm_access::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RealmAccess.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Realm> for ActiveModel {
    fn from(realm: &Realm) -> Self {
        Self {
            id: ActiveValue::Set(realm.id.clone()),
            name: ActiveValue::Set(realm.name.clone()),
            currency: ActiveValue::Set(realm.currency.code().to_string()),
            last_booking_id: ActiveValue::Set(realm.last_booking_id),
        }
    }
}

impl TryFrom<Model> for Realm {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            currency: Currency::try_from(model.currency.as_str())?,
            id: model.id,
            name: model.name,
            last_booking_id: model.last_booking_id,
        })
    }
}
