use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, Statement,
    TransactionTrait, prelude::*,
};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    AccessLevel, Booking, BookingCmd, BookingEntry, BookingFilter, ChangeEventType, ChangeSet,
    DateRange, EngineError, ResultEngine, accounts, booking_entries, bookings, realms,
    unbooked_transactions, util::normalize_optional_text, validate_entries,
};

use super::{Engine, with_tx};

impl Engine {
    /// Hands out the next booking id of the realm. The counter only grows.
    async fn next_booking_id(&self, db: &DatabaseTransaction, realm_id: &str) -> ResultEngine<i64> {
        let realm = realms::Entity::find_by_id(realm_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("realm {realm_id}")))?;
        let next = realm.last_booking_id + 1;
        let mut active: realms::ActiveModel = realm.into();
        active.last_booking_id = ActiveValue::Set(next);
        active.update(db).await?;
        Ok(next)
    }

    pub(super) async fn require_accounts_exist(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        entries: &[BookingEntry],
    ) -> ResultEngine<()> {
        let wanted: BTreeSet<&str> = entries.iter().map(|e| e.account_id.as_str()).collect();
        let found: BTreeSet<String> = accounts::Entity::find()
            .filter(accounts::Column::RealmId.eq(realm_id.to_string()))
            .filter(accounts::Column::Id.is_in(wanted.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        if let Some(missing) = wanted.into_iter().find(|id| !found.contains(*id)) {
            return Err(EngineError::NotFound(format!("account {missing}")));
        }
        Ok(())
    }

    async fn insert_entries(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        booking_id: i64,
        entries: &[BookingEntry],
    ) -> ResultEngine<()> {
        for entry in entries {
            booking_entries::ActiveModel::from_entry(realm_id, booking_id, entry)
                .insert(db)
                .await?;
        }
        Ok(())
    }

    /// Validates and persists a new booking under the next realm booking id.
    ///
    /// Callers hold the realm lock and have already checked write access.
    pub(super) async fn insert_booking(
        &self,
        db: &DatabaseTransaction,
        changes: &mut ChangeSet,
        realm_id: &str,
        description: Option<String>,
        datetime: DateTime<Utc>,
        mut entries: Vec<BookingEntry>,
    ) -> ResultEngine<Booking> {
        validate_entries(&mut entries)?;
        self.require_accounts_exist(db, realm_id, &entries).await?;

        let booking = Booking {
            id: self.next_booking_id(db, realm_id).await?,
            realm_id: realm_id.to_string(),
            description,
            datetime,
            entries,
        };
        bookings::ActiveModel::from(&booking).insert(db).await?;
        self.insert_entries(db, realm_id, booking.id, &booking.entries)
            .await?;

        changes
            .record(
                db,
                ChangeEventType::BookingAdded,
                realm_id,
                json!({ "bookingId": booking.id }),
            )
            .await?;
        debug!(realm_id, booking_id = booking.id, "booking inserted");
        Ok(booking)
    }

    /// Insert a booking, or replace the one named by `cmd.booking_id`.
    /// Returns the booking id.
    pub async fn add_or_replace_booking(&self, cmd: BookingCmd) -> ResultEngine<i64> {
        let description = normalize_optional_text(cmd.description.as_deref());
        let _guard = self.locks.lock(&cmd.realm_id).await;
        with_tx!(self, &cmd.user_id, |db_tx, changes| {
            self.require_access(&db_tx, &cmd.realm_id, &cmd.user_id, AccessLevel::Write)
                .await?;

            let booking_id = match cmd.booking_id {
                None => {
                    self.insert_booking(
                        &db_tx,
                        &mut changes,
                        &cmd.realm_id,
                        description,
                        cmd.datetime,
                        cmd.entries,
                    )
                    .await?
                    .id
                }
                Some(booking_id) => {
                    let header =
                        bookings::Entity::find_by_id((cmd.realm_id.clone(), booking_id))
                            .one(&db_tx)
                            .await?
                            .ok_or_else(|| {
                                EngineError::NotFound(format!("booking {booking_id}"))
                            })?;

                    let mut entries = cmd.entries;
                    validate_entries(&mut entries)?;
                    self.require_accounts_exist(&db_tx, &cmd.realm_id, &entries)
                        .await?;

                    booking_entries::Entity::delete_many()
                        .filter(booking_entries::Column::RealmId.eq(cmd.realm_id.clone()))
                        .filter(booking_entries::Column::BookingId.eq(booking_id))
                        .exec(&db_tx)
                        .await?;
                    self.insert_entries(&db_tx, &cmd.realm_id, booking_id, &entries)
                        .await?;

                    let mut active: bookings::ActiveModel = header.into();
                    active.description = ActiveValue::Set(description);
                    active.datetime = ActiveValue::Set(cmd.datetime);
                    active.update(&db_tx).await?;

                    changes
                        .record(
                            &db_tx,
                            ChangeEventType::BookingsChanged,
                            &cmd.realm_id,
                            json!({ "bookingId": booking_id }),
                        )
                        .await?;
                    booking_id
                }
            };
            Ok(booking_id)
        })
    }

    /// Delete a booking. Bank transactions matched to it return to the
    /// unbooked store under fresh ids, in the same transaction.
    pub async fn remove_booking(
        &self,
        realm_id: &str,
        booking_id: i64,
        user_id: &str,
    ) -> ResultEngine<()> {
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Write)
                .await?;
            bookings::Entity::find_by_id((realm_id.to_string(), booking_id))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))?;

            let matched: Vec<unbooked_transactions::Model> = unbooked_transactions::Entity::find()
                .filter(unbooked_transactions::Column::RealmId.eq(realm_id.to_string()))
                .filter(unbooked_transactions::Column::MatchedBookingId.eq(booking_id))
                .all(&db_tx)
                .await?;
            let unmatched = !matched.is_empty();
            for row in matched {
                self.unmatch_unbooked(&db_tx, row).await?;
            }

            booking_entries::Entity::delete_many()
                .filter(booking_entries::Column::RealmId.eq(realm_id.to_string()))
                .filter(booking_entries::Column::BookingId.eq(booking_id))
                .exec(&db_tx)
                .await?;
            bookings::Entity::delete_by_id((realm_id.to_string(), booking_id))
                .exec(&db_tx)
                .await?;

            changes
                .record(
                    &db_tx,
                    ChangeEventType::BookingsChanged,
                    realm_id,
                    json!({ "removed": booking_id }),
                )
                .await?;
            if unmatched {
                changes
                    .record(
                        &db_tx,
                        ChangeEventType::UnbookedTransactionsChanged,
                        realm_id,
                        json!({ "unmatchedFrom": booking_id }),
                    )
                    .await?;
            }
            info!(realm_id, booking_id, unmatched, "booking removed");
            Ok(())
        })
    }

    pub(super) async fn query_bookings(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        filters: &[BookingFilter],
        limit: Option<u64>,
    ) -> ResultEngine<Vec<Booking>> {
        let mut query =
            bookings::Entity::find().filter(bookings::Column::RealmId.eq(realm_id.to_string()));
        let mut ascending = false;
        for filter in filters {
            match filter {
                BookingFilter::DateRange { range } => {
                    if let Some(from) = range.from {
                        query = query.filter(bookings::Column::Datetime.gte(from));
                    }
                    if let Some(to) = range.to {
                        query = query.filter(bookings::Column::Datetime.lt(to));
                    }
                }
                BookingFilter::AccountIds { account_ids } => {
                    let ids: BTreeSet<i64> = booking_entries::Entity::find()
                        .filter(booking_entries::Column::RealmId.eq(realm_id.to_string()))
                        .filter(booking_entries::Column::AccountId.is_in(account_ids.clone()))
                        .all(db)
                        .await?
                        .into_iter()
                        .map(|e| e.booking_id)
                        .collect();
                    query = query.filter(bookings::Column::Id.is_in(ids));
                }
                BookingFilter::IdGreaterThan { id } => {
                    query = query.filter(bookings::Column::Id.gt(*id));
                }
                BookingFilter::Ascending => ascending = true,
            }
        }
        query = if ascending {
            query
                .order_by_asc(bookings::Column::Datetime)
                .order_by_asc(bookings::Column::Id)
        } else {
            query
                .order_by_desc(bookings::Column::Datetime)
                .order_by_desc(bookings::Column::Id)
        };
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        let headers = query.all(db).await?;

        let ids: Vec<i64> = headers.iter().map(|b| b.id).collect();
        let mut entries: HashMap<i64, Vec<booking_entries::Model>> = HashMap::new();
        for entry in booking_entries::Entity::find()
            .filter(booking_entries::Column::RealmId.eq(realm_id.to_string()))
            .filter(booking_entries::Column::BookingId.is_in(ids))
            .all(db)
            .await?
        {
            entries.entry(entry.booking_id).or_default().push(entry);
        }

        Ok(headers
            .into_iter()
            .map(|header| {
                let rows = entries.remove(&header.id).unwrap_or_default();
                Booking::from((header, rows))
            })
            .collect())
    }

    /// Bookings of a realm, newest first unless a filter asks otherwise.
    pub async fn get_bookings(
        &self,
        realm_id: &str,
        filters: &[BookingFilter],
        limit: Option<u64>,
        user_id: &str,
    ) -> ResultEngine<Vec<Booking>> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            self.query_bookings(&db_tx, realm_id, filters, limit).await
        })
    }

    pub async fn get_booking(
        &self,
        realm_id: &str,
        booking_id: i64,
        user_id: &str,
    ) -> ResultEngine<Booking> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            let header = bookings::Entity::find_by_id((realm_id.to_string(), booking_id))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))?;
            let entries = booking_entries::Entity::find()
                .filter(booking_entries::Column::RealmId.eq(realm_id.to_string()))
                .filter(booking_entries::Column::BookingId.eq(booking_id))
                .all(&db_tx)
                .await?;
            Ok(Booking::from((header, entries)))
        })
    }

    /// Sum of the entries on `account_ids` whose booking falls in `range`.
    ///
    /// Uses the same half-open range as the `DateRange` booking filter.
    pub(super) async fn sum_entries(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_ids: &[String],
        range: &DateRange,
    ) -> ResultEngine<i64> {
        if account_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; account_ids.len()].join(", ");
        let mut sql = format!(
            "SELECT COALESCE(SUM(e.amount_in_cents), 0) AS sum \
             FROM booking_entries e \
             JOIN bookings b ON b.realm_id = e.realm_id AND b.id = e.booking_id \
             WHERE e.realm_id = ? AND e.account_id IN ({placeholders})"
        );
        let mut values: Vec<sea_orm::Value> = vec![realm_id.to_string().into()];
        values.extend(account_ids.iter().map(|id| id.clone().into()));
        if let Some(from) = range.from {
            sql.push_str(" AND b.datetime >= ?");
            values.push(from.into());
        }
        if let Some(to) = range.to {
            sql.push_str(" AND b.datetime < ?");
            values.push(to.into());
        }

        let stmt = Statement::from_sql_and_values(db.get_database_backend(), sql, values);
        let row = db.query_one(stmt).await?;
        Ok(row
            .map(|r| r.try_get::<i64>("", "sum"))
            .transpose()?
            .unwrap_or(0))
    }
}
