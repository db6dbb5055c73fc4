use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, Statement, TransactionTrait,
    prelude::*,
};
use serde_json::json;
use tracing::debug;

use crate::{
    AccessLevel, ChangeEventType, DateRange, EngineError, ResultEngine, UnbookedTransaction,
    UnbookedTransactionCmd, bank_accounts, unbooked_transactions, util::normalize_optional_text,
};

use super::{Engine, with_tx};

/// Fields of a bank transaction before it gets an id.
pub(super) struct NewUnbooked {
    pub memo: Option<String>,
    pub datetime: DateTime<Utc>,
    pub amount_in_cents: i64,
    pub other_account_number: Option<String>,
}

impl Engine {
    pub(super) async fn require_bank_account(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
    ) -> ResultEngine<bank_accounts::Model> {
        bank_accounts::Entity::find_by_id((realm_id.to_string(), account_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("bank account {account_id}")))
    }

    /// Hands out the next unbooked transaction id of a bank account. The
    /// counter only grows.
    async fn next_unbooked_id(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
    ) -> ResultEngine<i64> {
        let bank_account = self.require_bank_account(db, realm_id, account_id).await?;
        let next = bank_account.last_unbooked_transaction_id + 1;
        let mut active: bank_accounts::ActiveModel = bank_account.into();
        active.last_unbooked_transaction_id = ActiveValue::Set(next);
        active.update(db).await?;
        Ok(next)
    }

    pub(super) async fn insert_unbooked(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
        new: NewUnbooked,
    ) -> ResultEngine<UnbookedTransaction> {
        let tx = UnbookedTransaction {
            realm_id: realm_id.to_string(),
            account_id: account_id.to_string(),
            id: self.next_unbooked_id(db, realm_id, account_id).await?,
            memo: new.memo,
            datetime: new.datetime,
            amount_in_cents: new.amount_in_cents,
            other_account_number: new.other_account_number,
            matched_booking_id: None,
        };
        unbooked_transactions::ActiveModel::from(&tx)
            .insert(db)
            .await?;
        Ok(tx)
    }

    /// Returns a matched row to the unbooked store under a fresh id.
    pub(super) async fn unmatch_unbooked(
        &self,
        db: &DatabaseTransaction,
        row: unbooked_transactions::Model,
    ) -> ResultEngine<UnbookedTransaction> {
        unbooked_transactions::Entity::delete_by_id((
            row.realm_id.clone(),
            row.account_id.clone(),
            row.id,
        ))
        .exec(db)
        .await?;
        let tx = self
            .insert_unbooked(
                db,
                &row.realm_id,
                &row.account_id,
                NewUnbooked {
                    memo: row.memo,
                    datetime: row.datetime,
                    amount_in_cents: row.amount_in_cents,
                    other_account_number: row.other_account_number,
                },
            )
            .await?;
        debug!(
            realm_id = %tx.realm_id,
            account_id = %tx.account_id,
            old_id = row.id,
            new_id = tx.id,
            "unbooked transaction unmatched"
        );
        Ok(tx)
    }

    pub(super) async fn mark_matched(
        &self,
        db: &DatabaseTransaction,
        row: unbooked_transactions::Model,
        booking_id: i64,
    ) -> ResultEngine<()> {
        let mut active: unbooked_transactions::ActiveModel = row.into();
        active.matched_booking_id = ActiveValue::Set(Some(booking_id));
        active.update(db).await?;
        Ok(())
    }

    /// Record one bank transaction by hand. Returns its id.
    pub async fn add_unbooked_transaction(&self, cmd: UnbookedTransactionCmd) -> ResultEngine<i64> {
        let _guard = self.locks.lock(&cmd.realm_id).await;
        with_tx!(self, &cmd.user_id, |db_tx, changes| {
            self.require_access(&db_tx, &cmd.realm_id, &cmd.user_id, AccessLevel::Write)
                .await?;
            let bank_account = self
                .require_bank_account(&db_tx, &cmd.realm_id, &cmd.account_id)
                .await?;
            if bank_account
                .close_date
                .is_some_and(|closed| cmd.datetime.date_naive() > closed)
            {
                return Err(EngineError::Validation(format!(
                    "bank account {} is closed",
                    cmd.account_id
                )));
            }

            let tx = self
                .insert_unbooked(
                    &db_tx,
                    &cmd.realm_id,
                    &cmd.account_id,
                    NewUnbooked {
                        memo: normalize_optional_text(cmd.memo.as_deref()),
                        datetime: cmd.datetime,
                        amount_in_cents: cmd.amount_in_cents,
                        other_account_number: normalize_optional_text(
                            cmd.other_account_number.as_deref(),
                        ),
                    },
                )
                .await?;
            changes
                .record(
                    &db_tx,
                    ChangeEventType::UnbookedTransactionsChanged,
                    &cmd.realm_id,
                    json!({ "accountId": cmd.account_id, "added": tx.id }),
                )
                .await?;
            Ok(tx.id)
        })
    }

    /// Delete an unmatched bank transaction.
    pub async fn remove_unbooked_transaction(
        &self,
        realm_id: &str,
        account_id: &str,
        transaction_id: i64,
        user_id: &str,
    ) -> ResultEngine<()> {
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Write)
                .await?;
            let row = self
                .require_unbooked(&db_tx, realm_id, account_id, transaction_id)
                .await?;
            if let Some(booking_id) = row.matched_booking_id {
                return Err(EngineError::PreconditionFailed(format!(
                    "transaction {transaction_id} is booked by booking {booking_id}"
                )));
            }
            unbooked_transactions::Entity::delete_by_id((
                realm_id.to_string(),
                account_id.to_string(),
                transaction_id,
            ))
            .exec(&db_tx)
            .await?;
            changes
                .record(
                    &db_tx,
                    ChangeEventType::UnbookedTransactionsChanged,
                    realm_id,
                    json!({ "accountId": account_id, "removed": transaction_id }),
                )
                .await?;
            Ok(())
        })
    }

    pub(super) async fn require_unbooked(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
        transaction_id: i64,
    ) -> ResultEngine<unbooked_transactions::Model> {
        unbooked_transactions::Entity::find_by_id((
            realm_id.to_string(),
            account_id.to_string(),
            transaction_id,
        ))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("unbooked transaction {transaction_id}")))
    }

    /// Unmatched rows of a bank account, oldest first.
    pub(super) async fn query_unbooked(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
        range: &DateRange,
    ) -> ResultEngine<Vec<UnbookedTransaction>> {
        let mut query = unbooked_transactions::Entity::find()
            .filter(unbooked_transactions::Column::RealmId.eq(realm_id.to_string()))
            .filter(unbooked_transactions::Column::AccountId.eq(account_id.to_string()))
            .filter(unbooked_transactions::Column::MatchedBookingId.is_null());
        if let Some(from) = range.from {
            query = query.filter(unbooked_transactions::Column::Datetime.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(unbooked_transactions::Column::Datetime.lt(to));
        }
        Ok(query
            .order_by_asc(unbooked_transactions::Column::Datetime)
            .order_by_asc(unbooked_transactions::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(UnbookedTransaction::from)
            .collect())
    }

    pub async fn get_unbooked_transactions(
        &self,
        realm_id: &str,
        account_id: &str,
        range: &DateRange,
        user_id: &str,
    ) -> ResultEngine<Vec<UnbookedTransaction>> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            self.require_bank_account(&db_tx, realm_id, account_id)
                .await?;
            self.query_unbooked(&db_tx, realm_id, account_id, range)
                .await
        })
    }

    /// Sum of the unmatched rows of a bank account in `range`.
    pub(super) async fn unbooked_sum(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
        range: &DateRange,
    ) -> ResultEngine<i64> {
        let mut sql = "SELECT COALESCE(SUM(amount_in_cents), 0) AS sum \
                       FROM unbooked_bank_transactions \
                       WHERE realm_id = ? AND account_id = ? AND matched_booking_id IS NULL"
            .to_string();
        let mut values: Vec<sea_orm::Value> =
            vec![realm_id.to_string().into(), account_id.to_string().into()];
        if let Some(from) = range.from {
            sql.push_str(" AND datetime >= ?");
            values.push(from.into());
        }
        if let Some(to) = range.to {
            sql.push_str(" AND datetime < ?");
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
