//! Bookings.
//!
//! A [`Booking`] is a dated set of [`BookingEntry`]s moving amounts between
//! accounts. Amounts are signed integer cents; the entries of a booking
//! always sum to zero and a booking always has at least one entry. Both
//! rules are checked by [`validate_entries`] before anything is persisted.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, booking_entries};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEntry {
    /// 0-based position inside the booking.
    #[serde(default)]
    pub id: i32,
    pub description: Option<String>,
    pub account_id: String,
    pub amount_in_cents: i64,
    #[serde(default)]
    pub checked: bool,
}

impl BookingEntry {
    pub fn new(account_id: impl Into<String>, amount_in_cents: i64) -> Self {
        Self {
            id: 0,
            description: None,
            account_id: account_id.into(),
            amount_in_cents,
            checked: false,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub realm_id: String,
    pub description: Option<String>,
    pub datetime: DateTime<Utc>,
    pub entries: Vec<BookingEntry>,
}

/// `-amount`, or a validation error for `i64::MIN`.
pub(crate) fn negated(amount_in_cents: i64) -> ResultEngine<i64> {
    amount_in_cents.checked_neg().ok_or_else(|| {
        EngineError::Validation(format!("amount {amount_in_cents} cannot be negated"))
    })
}

/// Checks the zero-sum and non-empty invariants and renumbers entries
/// `0..n` in the given order.
pub fn validate_entries(entries: &mut [BookingEntry]) -> ResultEngine<()> {
    if entries.is_empty() {
        return Err(EngineError::Validation(
            "booking must have at least one entry".to_string(),
        ));
    }
    let mut sum: i64 = 0;
    for entry in entries.iter() {
        if entry.account_id.trim().is_empty() {
            return Err(EngineError::Validation(
                "booking entry must reference an account".to_string(),
            ));
        }
        sum = sum.checked_add(entry.amount_in_cents).ok_or_else(|| {
            EngineError::Validation("booking entries overflow".to_string())
        })?;
    }
    if sum != 0 {
        return Err(EngineError::Validation(format!(
            "booking entries must sum to zero, got {sum}"
        )));
    }
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.id = i32::try_from(index)
            .map_err(|_| EngineError::Validation("too many booking entries".to_string()))?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub realm_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub description: Option<String>,
    pub datetime: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Booking> for ActiveModel {
    fn from(booking: &Booking) -> Self {
        Self {
            realm_id: ActiveValue::Set(booking.realm_id.clone()),
            id: ActiveValue::Set(booking.id),
            description: ActiveValue::Set(booking.description.clone()),
            datetime: ActiveValue::Set(booking.datetime),
        }
    }
}

impl From<(Model, Vec<booking_entries::Model>)> for Booking {
    fn from((model, mut entries): (Model, Vec<booking_entries::Model>)) -> Self {
        entries.sort_by_key(|e| e.id);
        Self {
            id: model.id,
            realm_id: model.realm_id,
            description: model.description,
            datetime: model.datetime,
            entries: entries.into_iter().map(BookingEntry::from).collect(),
        }
    }
}
