use chrono::{Days, NaiveDate, NaiveTime};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    AccessLevel, ChangeEventType, ChangeSet, DuplicatePredicate, EngineError, ImportRecord,
    ImportReport, ResultEngine, UnbookedTransaction, unbooked_transactions,
    util::normalize_optional_text,
};

use super::{Engine, unbooked::NewUnbooked, with_tx};

impl Engine {
    /// Every row of a bank account on `day`, matched or not.
    async fn rows_on_day(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
        day: NaiveDate,
    ) -> ResultEngine<Vec<UnbookedTransaction>> {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = (day + Days::new(1)).and_time(NaiveTime::MIN).and_utc();
        Ok(unbooked_transactions::Entity::find()
            .filter(unbooked_transactions::Column::RealmId.eq(realm_id.to_string()))
            .filter(unbooked_transactions::Column::AccountId.eq(account_id.to_string()))
            .filter(unbooked_transactions::Column::Datetime.gte(start))
            .filter(unbooked_transactions::Column::Datetime.lt(end))
            .order_by_asc(unbooked_transactions::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(UnbookedTransaction::from)
            .collect())
    }

    /// Inserts the records, skipping leading duplicates. Returns
    /// `(imported, skipped)`.
    async fn import_rows(
        &self,
        db: &DatabaseTransaction,
        changes: &mut ChangeSet,
        realm_id: &str,
        account_id: &str,
        records: Vec<ImportRecord>,
        predicate: &dyn DuplicatePredicate,
    ) -> ResultEngine<(usize, usize)> {
        let mut imported = 0;
        let mut skipped = 0;
        let mut deduplicate = true;
        for record in records {
            if deduplicate {
                let existing = self
                    .rows_on_day(db, realm_id, account_id, record.datetime.date_naive())
                    .await?;
                if existing
                    .iter()
                    .any(|row| predicate.is_duplicate(row, &record))
                {
                    skipped += 1;
                    continue;
                }
                // The rest of the export is new.
                deduplicate = false;
            }
            self.insert_unbooked(
                db,
                realm_id,
                account_id,
                NewUnbooked {
                    memo: record.description,
                    datetime: record.datetime,
                    amount_in_cents: record.amount_in_cents,
                    other_account_number: record.other_account_number,
                },
            )
            .await?;
            imported += 1;
        }
        if imported > 0 {
            changes
                .record(
                    db,
                    ChangeEventType::UnbookedTransactionsChanged,
                    realm_id,
                    json!({ "accountId": account_id, "imported": imported }),
                )
                .await?;
        }
        Ok((imported, skipped))
    }

    /// Imports one sorted batch in a single transaction. Returns
    /// `(imported, duplicates, closed)`, where `closed` counts records dated
    /// after the account was closed. Commit failures surface here too.
    async fn import_batch(
        &self,
        realm_id: &str,
        account_id: &str,
        incoming: Vec<ImportRecord>,
        predicate: &dyn DuplicatePredicate,
        user_id: &str,
    ) -> ResultEngine<(usize, usize, usize)> {
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Write)
                .await?;
            let bank_account = self
                .require_bank_account(&db_tx, realm_id, account_id)
                .await?;
            let (open, closed): (Vec<_>, Vec<_>) = incoming.into_iter().partition(|r| {
                bank_account
                    .close_date
                    .is_none_or(|closed| r.datetime.date_naive() <= closed)
            });
            let (imported, duplicates) = self
                .import_rows(&db_tx, &mut changes, realm_id, account_id, open, predicate)
                .await?;
            Ok((imported, duplicates, closed.len()))
        })
    }

    /// Import parsed bank records into a bank account's unbooked store.
    ///
    /// Malformed records are skipped and reported. A storage failure rolls
    /// back the whole batch and is reported as well; authorization and
    /// lookup failures are returned as errors.
    pub async fn import_bank_transactions(
        &self,
        realm_id: &str,
        account_id: &str,
        records: Vec<ResultEngine<ImportRecord>>,
        predicate: &dyn DuplicatePredicate,
        user_id: &str,
    ) -> ResultEngine<ImportReport> {
        let mut report = ImportReport::default();
        let mut incoming = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Ok(mut record) => {
                    record.description = normalize_optional_text(record.description.as_deref());
                    record.other_account_number =
                        normalize_optional_text(record.other_account_number.as_deref());
                    incoming.push(record);
                }
                Err(err) => {
                    report.skipped += 1;
                    report.error.get_or_insert_with(|| err.to_string());
                }
            }
        }
        incoming.sort_by_key(|r| r.datetime);
        let total = report.skipped + incoming.len();

        match self
            .import_batch(realm_id, account_id, incoming, predicate, user_id)
            .await
        {
            Ok((imported, duplicates, closed)) => {
                if closed > 0 {
                    report
                        .error
                        .get_or_insert_with(|| format!("bank account {account_id} is closed"));
                }
                report.imported = imported;
                report.skipped += duplicates + closed;
                info!(realm_id, account_id, imported, skipped = report.skipped, "bank transactions imported");
                Ok(report)
            }
            Err(EngineError::Storage(err)) => {
                warn!(realm_id, account_id, error = %err, "import rolled back");
                report.rolled_back(total, err.to_string());
                Ok(report)
            }
            Err(err) => Err(err),
        }
    }
}
