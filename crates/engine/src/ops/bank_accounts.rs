use chrono::{NaiveDate, NaiveTime};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use tracing::info;

use crate::{
    AccessLevel, Account, BankAccount, BankAccountCmd, BankAccountTransaction, BookingEntry,
    BookingFilter, ChangeEventType, DateRange, EngineError, ResultEngine, StandardAccount,
    accounts, bank_accounts,
    bookings::negated,
    util::{id_or_new, normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    /// Open a bank account: the backing account below `BankAccountAsset`
    /// (or `BankAccountLiability`), the bank account row, and an opening
    /// booking against `OpeningBalances` for a non-zero opening balance.
    pub async fn add_bank_account(&self, cmd: BankAccountCmd) -> ResultEngine<String> {
        let name = normalize_required_name(&cmd.name, "bank account")?;
        let bank_id = normalize_required_name(&cmd.bank_id, "bank")?;
        let account_id = id_or_new(cmd.account_id.as_deref(), "bank account")?;
        let parent = if cmd.liability {
            StandardAccount::BankAccountLiability
        } else {
            StandardAccount::BankAccountAsset
        };
        let account = Account {
            id: account_id.clone(),
            realm_id: cmd.realm_id.clone(),
            name,
            description: None,
            parent_account_id: Some(parent.as_str().to_string()),
            is_standard: false,
        };
        let bank_account = BankAccount {
            account_id: account_id.clone(),
            realm_id: cmd.realm_id.clone(),
            bank_id,
            account_number: normalize_optional_text(cmd.account_number.as_deref()),
            open_date: cmd.open_date,
            close_date: None,
            last_unbooked_transaction_id: 0,
        };

        let _guard = self.locks.lock(&cmd.realm_id).await;
        with_tx!(self, &cmd.user_id, |db_tx, changes| {
            self.require_access(&db_tx, &cmd.realm_id, &cmd.user_id, AccessLevel::Write)
                .await?;
            if accounts::Entity::find_by_id((cmd.realm_id.clone(), account_id.clone()))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(account_id));
            }
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            bank_accounts::ActiveModel::from(&bank_account)
                .insert(&db_tx)
                .await?;

            if cmd.opening_balance != 0 {
                self.insert_booking(
                    &db_tx,
                    &mut changes,
                    &cmd.realm_id,
                    Some("Opening balance".to_string()),
                    cmd.open_date.and_time(NaiveTime::MIN).and_utc(),
                    vec![
                        BookingEntry::new(account_id.clone(), cmd.opening_balance),
                        BookingEntry::new(
                            StandardAccount::OpeningBalances.as_str(),
                            negated(cmd.opening_balance)?,
                        ),
                    ],
                )
                .await?;
            }

            let payload = json!({ "accountId": account_id });
            changes
                .record(
                    &db_tx,
                    ChangeEventType::AccountsChanged,
                    &cmd.realm_id,
                    payload.clone(),
                )
                .await?;
            changes
                .record(
                    &db_tx,
                    ChangeEventType::BankAccountUpdated,
                    &cmd.realm_id,
                    payload,
                )
                .await?;
            info!(realm_id = %cmd.realm_id, %account_id, "bank account opened");
            Ok(account_id.clone())
        })
    }

    pub async fn close_bank_account(
        &self,
        realm_id: &str,
        account_id: &str,
        close_date: NaiveDate,
        user_id: &str,
    ) -> ResultEngine<()> {
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Write)
                .await?;
            let model = self
                .require_bank_account(&db_tx, realm_id, account_id)
                .await?;
            if close_date < model.open_date {
                return Err(EngineError::Validation(format!(
                    "close date {close_date} is before open date {}",
                    model.open_date
                )));
            }
            let mut active: bank_accounts::ActiveModel = model.into();
            active.close_date = ActiveValue::Set(Some(close_date));
            active.update(&db_tx).await?;

            changes
                .record(
                    &db_tx,
                    ChangeEventType::BankAccountUpdated,
                    realm_id,
                    json!({ "accountId": account_id, "closed": close_date }),
                )
                .await?;
            Ok(())
        })
    }

    pub async fn get_bank_accounts(
        &self,
        realm_id: &str,
        user_id: &str,
    ) -> ResultEngine<Vec<BankAccount>> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            Ok(bank_accounts::Entity::find()
                .filter(bank_accounts::Column::RealmId.eq(realm_id.to_string()))
                .order_by_asc(bank_accounts::Column::AccountId)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(BankAccount::from)
                .collect())
        })
    }

    /// Booked plus still unbooked amount of a bank account in `range`.
    pub async fn bank_account_balance(
        &self,
        realm_id: &str,
        account_id: &str,
        range: &DateRange,
        user_id: &str,
    ) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            self.require_bank_account(&db_tx, realm_id, account_id)
                .await?;
            let booked = self
                .sum_entries(&db_tx, realm_id, &[account_id.to_string()], range)
                .await?;
            let unbooked = self
                .unbooked_sum(&db_tx, realm_id, account_id, range)
                .await?;
            Ok(booked + unbooked)
        })
    }

    /// Statement of a bank account: booked entries and unmatched bank
    /// transactions in `range`, oldest first, with a running balance that
    /// starts from the balance before the range.
    pub async fn bank_account_transactions(
        &self,
        realm_id: &str,
        account_id: &str,
        range: &DateRange,
        user_id: &str,
    ) -> ResultEngine<Vec<BankAccountTransaction>> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            self.require_bank_account(&db_tx, realm_id, account_id)
                .await?;

            let mut balance = match range.from {
                Some(from) => {
                    let before = DateRange {
                        from: None,
                        to: Some(from),
                    };
                    self.sum_entries(&db_tx, realm_id, &[account_id.to_string()], &before)
                        .await?
                        + self
                            .unbooked_sum(&db_tx, realm_id, account_id, &before)
                            .await?
                }
                None => 0,
            };

            let filters = [
                BookingFilter::AccountIds {
                    account_ids: vec![account_id.to_string()],
                },
                BookingFilter::DateRange {
                    range: range.clone(),
                },
                BookingFilter::Ascending,
            ];
            let mut lines: Vec<BankAccountTransaction> = self
                .query_bookings(&db_tx, realm_id, &filters, None)
                .await?
                .into_iter()
                .map(|booking| {
                    let own: Vec<&BookingEntry> = booking
                        .entries
                        .iter()
                        .filter(|e| e.account_id == account_id)
                        .collect();
                    BankAccountTransaction {
                        datetime: booking.datetime,
                        booking_id: Some(booking.id),
                        unbooked_transaction_id: None,
                        description: booking
                            .description
                            .clone()
                            .or_else(|| own.iter().find_map(|e| e.description.clone())),
                        amount_in_cents: own.iter().map(|e| e.amount_in_cents).sum(),
                        balance_in_cents: 0,
                    }
                })
                .collect();
            lines.extend(
                self.query_unbooked(&db_tx, realm_id, account_id, range)
                    .await?
                    .into_iter()
                    .map(|tx| BankAccountTransaction {
                        datetime: tx.datetime,
                        booking_id: None,
                        unbooked_transaction_id: Some(tx.id),
                        description: tx.memo,
                        amount_in_cents: tx.amount_in_cents,
                        balance_in_cents: 0,
                    }),
            );
            lines.sort_by_key(BankAccountTransaction::sort_key);
            for line in &mut lines {
                balance += line.amount_in_cents;
                line.balance_in_cents = balance;
            }
            Ok(lines)
        })
    }
}
