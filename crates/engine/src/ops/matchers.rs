use chrono::{Days, NaiveTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use tracing::info;

use crate::{
    AccessLevel, Account, ActionExpr, ChangeEventType, ChangeSet, ControlAccountType,
    EngineError, MatcherCmd, ResultEngine, StandardAccount, UnbookedBankTransactionMatcher,
    UnbookedTransaction, accounts, bank_accounts, matchers,
    bookings::negated,
    matching::{categorize_entries, transfer_entries},
    unbooked_transactions,
    util::{id_or_new, normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

/// Id of the control account a matcher books through: the standard
/// control account, or its per-party child.
fn control_account_id(control: ControlAccountType, party: Option<&str>) -> String {
    let standard = control_standard(control);
    match party {
        Some(party) => format!("{}:{party}", standard.as_str()),
        None => standard.as_str().to_string(),
    }
}

fn control_standard(control: ControlAccountType) -> StandardAccount {
    match control {
        ControlAccountType::Payable => StandardAccount::AccountPayable,
        ControlAccountType::Receivable => StandardAccount::AccountReceivable,
    }
}

impl Engine {
    async fn require_matcher(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        matcher_id: &str,
    ) -> ResultEngine<UnbookedBankTransactionMatcher> {
        let model = matchers::Entity::find_by_id((realm_id.to_string(), matcher_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("matcher {matcher_id}")))?;
        UnbookedBankTransactionMatcher::try_from(model)
    }

    async fn load_matchers(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
    ) -> ResultEngine<Vec<UnbookedBankTransactionMatcher>> {
        matchers::Entity::find()
            .filter(matchers::Column::RealmId.eq(realm_id.to_string()))
            .order_by_asc(matchers::Column::Name)
            .order_by_asc(matchers::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(UnbookedBankTransactionMatcher::try_from)
            .collect()
    }

    /// Checks that a party account exists and sits below `Parties`.
    async fn require_party(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        party_id: &str,
    ) -> ResultEngine<Account> {
        let party = self.require_account(db, realm_id, party_id).await?;
        let tree = self.load_tree(db, realm_id).await?;
        if !tree.is_within(party_id, StandardAccount::Parties.as_str()) {
            return Err(EngineError::Validation(format!(
                "account {party_id} is not a party account"
            )));
        }
        Ok(party)
    }

    /// Returns the control account for `control`, creating the per-party
    /// child on first use.
    async fn ensure_control_account(
        &self,
        db: &DatabaseTransaction,
        changes: &mut ChangeSet,
        realm_id: &str,
        control: ControlAccountType,
        party_id: Option<&str>,
    ) -> ResultEngine<String> {
        let id = control_account_id(control, party_id);
        let Some(party_id) = party_id else {
            return Ok(id);
        };
        if accounts::Entity::find_by_id((realm_id.to_string(), id.clone()))
            .one(db)
            .await?
            .is_some()
        {
            return Ok(id);
        }

        let party = self.require_party(db, realm_id, party_id).await?;
        let standard = control_standard(control);
        let account = Account {
            id: id.clone(),
            realm_id: realm_id.to_string(),
            name: format!("{} {}", standard.display_name(), party.name),
            description: None,
            parent_account_id: Some(standard.as_str().to_string()),
            is_standard: false,
        };
        accounts::ActiveModel::from(&account).insert(db).await?;
        changes
            .record(
                db,
                ChangeEventType::AccountsChanged,
                realm_id,
                json!({ "accountId": id }),
            )
            .await?;
        info!(realm_id, account_id = %id, "party control account created");
        Ok(id)
    }

    /// Create a matcher or replace an existing one. Returns the matcher id.
    pub async fn add_or_replace_matcher(&self, cmd: MatcherCmd) -> ResultEngine<String> {
        let name = normalize_required_name(&cmd.name, "matcher")?;
        let matcher_id = id_or_new(cmd.matcher_id.as_deref(), "matcher")?;
        cmd.filter.validate()?;
        cmd.action.validate()?;

        let _guard = self.locks.lock(&cmd.realm_id).await;
        with_tx!(self, &cmd.user_id, |db_tx, changes| {
            self.require_access(&db_tx, &cmd.realm_id, &cmd.user_id, AccessLevel::Write)
                .await?;

            match &cmd.action {
                ActionExpr::Transfer => {
                    let target = cmd.action_account_id.as_deref().ok_or_else(|| {
                        EngineError::Validation(
                            "a transfer matcher needs an action account".to_string(),
                        )
                    })?;
                    self.require_account(&db_tx, &cmd.realm_id, target).await?;
                }
                ActionExpr::AccountAction {
                    main_account_id,
                    additional_splits,
                    ..
                } => {
                    self.require_account(&db_tx, &cmd.realm_id, main_account_id)
                        .await?;
                    for account_id in additional_splits.keys() {
                        self.require_account(&db_tx, &cmd.realm_id, account_id)
                            .await?;
                    }
                    if let Some(party) = cmd.action_account_id.as_deref() {
                        self.require_party(&db_tx, &cmd.realm_id, party).await?;
                    }
                }
            }

            let existing = matchers::Entity::find_by_id((cmd.realm_id.clone(), matcher_id.clone()))
                .one(&db_tx)
                .await?;
            let matcher = UnbookedBankTransactionMatcher {
                id: matcher_id.clone(),
                realm_id: cmd.realm_id.clone(),
                name: name.clone(),
                filter: cmd.filter.clone(),
                action: cmd.action.clone(),
                action_account_id: cmd.action_account_id.clone(),
                action_memo: normalize_optional_text(cmd.action_memo.as_deref()),
                last_used: existing.as_ref().and_then(|m| m.last_used),
            };
            let active = matchers::ActiveModel::try_from(&matcher)?;
            if existing.is_some() {
                active.update(&db_tx).await?;
            } else {
                active.insert(&db_tx).await?;
            }

            changes
                .record(
                    &db_tx,
                    ChangeEventType::UnbookedTransactionMatchersChanged,
                    &cmd.realm_id,
                    json!({ "matcherId": matcher_id }),
                )
                .await?;
            Ok(matcher_id.clone())
        })
    }

    pub async fn remove_matcher(
        &self,
        realm_id: &str,
        matcher_id: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Write)
                .await?;
            self.require_matcher(&db_tx, realm_id, matcher_id).await?;
            matchers::Entity::delete_by_id((realm_id.to_string(), matcher_id.to_string()))
                .exec(&db_tx)
                .await?;
            changes
                .record(
                    &db_tx,
                    ChangeEventType::UnbookedTransactionMatchersChanged,
                    realm_id,
                    json!({ "removed": matcher_id }),
                )
                .await?;
            Ok(())
        })
    }

    pub async fn get_matchers(
        &self,
        realm_id: &str,
        user_id: &str,
    ) -> ResultEngine<Vec<UnbookedBankTransactionMatcher>> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            self.load_matchers(&db_tx, realm_id).await
        })
    }

    /// Matchers whose filter accepts an unmatched bank transaction. A
    /// matched transaction has no candidates.
    pub async fn matching_matchers(
        &self,
        realm_id: &str,
        account_id: &str,
        transaction_id: i64,
        user_id: &str,
    ) -> ResultEngine<Vec<UnbookedBankTransactionMatcher>> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            let row = self
                .require_unbooked(&db_tx, realm_id, account_id, transaction_id)
                .await?;
            let tx = UnbookedTransaction::from(row);
            if tx.matched_booking_id.is_some() {
                Ok(Vec::new())
            } else {
                Ok(self
                    .load_matchers(&db_tx, realm_id)
                    .await?
                    .into_iter()
                    .filter(|m| m.filter.matches(&tx))
                    .collect())
            }
        })
    }

    /// The unmatched row of `account_id` on the same day as `tx` carrying
    /// the negated amount, if any.
    async fn find_counterpart(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
        tx: &UnbookedTransaction,
    ) -> ResultEngine<Option<unbooked_transactions::Model>> {
        let day = tx.datetime.date_naive();
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = (day + Days::new(1)).and_time(NaiveTime::MIN).and_utc();
        Ok(unbooked_transactions::Entity::find()
            .filter(unbooked_transactions::Column::RealmId.eq(realm_id.to_string()))
            .filter(unbooked_transactions::Column::AccountId.eq(account_id.to_string()))
            .filter(unbooked_transactions::Column::MatchedBookingId.is_null())
            .filter(unbooked_transactions::Column::AmountInCents.eq(negated(tx.amount_in_cents)?))
            .filter(unbooked_transactions::Column::Datetime.gte(start))
            .filter(unbooked_transactions::Column::Datetime.lt(end))
            .order_by_asc(unbooked_transactions::Column::Id)
            .one(db)
            .await?)
    }

    /// Book an unmatched bank transaction with a matcher. Returns the ids of
    /// the created bookings: one for a transfer, two for an account action.
    ///
    /// Everything happens in one transaction; a failure leaves no booking
    /// behind and the bank transaction unmatched.
    pub async fn execute_matcher(
        &self,
        realm_id: &str,
        account_id: &str,
        transaction_id: i64,
        matcher_id: &str,
        user_id: &str,
    ) -> ResultEngine<Vec<i64>> {
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Write)
                .await?;
            let row = self
                .require_unbooked(&db_tx, realm_id, account_id, transaction_id)
                .await?;
            if let Some(booking_id) = row.matched_booking_id {
                return Err(EngineError::PreconditionFailed(format!(
                    "transaction {transaction_id} is already booked by booking {booking_id}"
                )));
            }
            let mut matcher = self.require_matcher(&db_tx, realm_id, matcher_id).await?;
            let tx = UnbookedTransaction::from(row.clone());
            if !matcher.filter.matches(&tx) {
                return Err(EngineError::PreconditionFailed(format!(
                    "matcher {matcher_id} does not match transaction {transaction_id}"
                )));
            }
            let description = matcher.action_memo.clone().or_else(|| tx.memo.clone());

            let booking_ids = match &matcher.action {
                ActionExpr::Transfer => {
                    let target = matcher.action_account_id.clone().ok_or_else(|| {
                        EngineError::Validation(format!(
                            "matcher {matcher_id} has no action account"
                        ))
                    })?;
                    if target == account_id {
                        return Err(EngineError::Validation(format!(
                            "cannot transfer transaction {transaction_id} into its own account"
                        )));
                    }
                    let booking = self
                        .insert_booking(
                            &db_tx,
                            &mut changes,
                            realm_id,
                            description,
                            tx.datetime,
                            transfer_entries(&tx, &target)?,
                        )
                        .await?;
                    self.mark_matched(&db_tx, row, booking.id).await?;

                    let target_is_bank =
                        bank_accounts::Entity::find_by_id((realm_id.to_string(), target.clone()))
                            .one(&db_tx)
                            .await?
                            .is_some();
                    if target_is_bank {
                        if let Some(counterpart) = self
                            .find_counterpart(&db_tx, realm_id, &target, &tx)
                            .await?
                        {
                            self.mark_matched(&db_tx, counterpart, booking.id).await?;
                        }
                    }
                    vec![booking.id]
                }
                ActionExpr::AccountAction {
                    control,
                    main_account_id,
                    additional_splits,
                } => {
                    let control_id = control_account_id(*control, matcher.action_account_id.as_deref());
                    // Built before anything is written so a bad split set
                    // leaves no intermediary booking.
                    let paid_entries = transfer_entries(&tx, &control_id)?;
                    let categorized =
                        categorize_entries(&tx, &control_id, main_account_id, additional_splits)?;
                    self.ensure_control_account(
                        &db_tx,
                        &mut changes,
                        realm_id,
                        *control,
                        matcher.action_account_id.as_deref(),
                    )
                    .await?;

                    let paid = self
                        .insert_booking(
                            &db_tx,
                            &mut changes,
                            realm_id,
                            description.clone(),
                            tx.datetime,
                            paid_entries,
                        )
                        .await?;
                    let categorized = self
                        .insert_booking(
                            &db_tx,
                            &mut changes,
                            realm_id,
                            description,
                            tx.datetime,
                            categorized,
                        )
                        .await?;
                    self.mark_matched(&db_tx, row, paid.id).await?;
                    vec![paid.id, categorized.id]
                }
            };

            matcher.last_used = Some(Utc::now());
            matchers::ActiveModel::try_from(&matcher)?
                .update(&db_tx)
                .await?;

            let payload = json!({
                "accountId": account_id,
                "transactionId": transaction_id,
                "matcherId": matcher_id,
                "bookingIds": booking_ids,
            });
            for event in [
                ChangeEventType::UnbookedTransactionMatchersChanged,
                ChangeEventType::UnbookedTransactionsChanged,
                ChangeEventType::BankAccountUpdated,
            ] {
                changes
                    .record(&db_tx, event, realm_id, payload.clone())
                    .await?;
            }
            info!(realm_id, account_id, transaction_id, matcher_id, "matcher executed");
            Ok(booking_ids)
        })
    }
}
