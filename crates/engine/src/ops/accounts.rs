use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde_json::json;
use tracing::info;

use crate::{
    AccessLevel, Account, AccountCmd, AccountTree, ActionExpr, ChangeEventType, DateRange,
    EngineError, ResultEngine, UnbookedBankTransactionMatcher, accounts, bank_accounts,
    booking_entries, matchers,
    util::{id_or_new, normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    pub(super) async fn load_accounts(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
    ) -> ResultEngine<Vec<Account>> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::RealmId.eq(realm_id.to_string()))
            .order_by_asc(accounts::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Account::from)
            .collect())
    }

    pub(super) async fn load_tree(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
    ) -> ResultEngine<AccountTree> {
        let accounts = self.load_accounts(db, realm_id).await?;
        AccountTree::build(&accounts)
    }

    pub(super) async fn require_account(
        &self,
        db: &DatabaseTransaction,
        realm_id: &str,
        account_id: &str,
    ) -> ResultEngine<Account> {
        accounts::Entity::find_by_id((realm_id.to_string(), account_id.to_string()))
            .one(db)
            .await?
            .map(Account::from)
            .ok_or_else(|| EngineError::NotFound(format!("account {account_id}")))
    }

    /// Create a user account or replace an existing one. Standard accounts
    /// cannot be changed. Returns the account id.
    pub async fn add_or_replace_account(&self, cmd: AccountCmd) -> ResultEngine<String> {
        let name = normalize_required_name(&cmd.name, "account")?;
        let account_id = id_or_new(cmd.account_id.as_deref(), "account")?;
        let account = Account {
            id: account_id.clone(),
            realm_id: cmd.realm_id.clone(),
            name,
            description: normalize_optional_text(cmd.description.as_deref()),
            parent_account_id: Some(cmd.parent_account_id.clone()),
            is_standard: false,
        };
        let _guard = self.locks.lock(&cmd.realm_id).await;
        with_tx!(self, &cmd.user_id, |db_tx, changes| {
            self.require_access(&db_tx, &cmd.realm_id, &cmd.user_id, AccessLevel::Write)
                .await?;

            let mut all = self.load_accounts(&db_tx, &cmd.realm_id).await?;
            let existing = all.iter().position(|a| a.id == account_id);
            if let Some(index) = existing {
                if all[index].is_standard {
                    return Err(EngineError::Validation(format!(
                        "standard account {account_id} cannot be changed"
                    )));
                }
                all[index] = account.clone();
            } else {
                all.push(account.clone());
            }
            if !all.iter().any(|a| a.id == cmd.parent_account_id) {
                return Err(EngineError::NotFound(format!(
                    "parent account {}",
                    cmd.parent_account_id
                )));
            }
            // Rejects re-parenting into the account's own subtree.
            AccountTree::build(&all)?;

            let active = accounts::ActiveModel::from(&account);
            if existing.is_some() {
                active.update(&db_tx).await?;
            } else {
                active.insert(&db_tx).await?;
            }

            changes
                .record(
                    &db_tx,
                    ChangeEventType::AccountsChanged,
                    &cmd.realm_id,
                    json!({ "accountId": account_id }),
                )
                .await?;
            Ok(account_id.clone())
        })
    }

    /// Fold `source` into `target`: entries and matchers pointing at
    /// `source` are re-pointed, then `source` is deleted.
    pub async fn merge_account(
        &self,
        realm_id: &str,
        source: &str,
        target: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        if source == target {
            return Err(EngineError::Validation(
                "cannot merge an account into itself".to_string(),
            ));
        }
        let _guard = self.locks.lock(realm_id).await;
        with_tx!(self, user_id, |db_tx, changes| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Write)
                .await?;
            let source_account = self.require_account(&db_tx, realm_id, source).await?;
            self.require_account(&db_tx, realm_id, target).await?;

            if source_account.is_standard {
                return Err(EngineError::Validation(format!(
                    "standard account {source} cannot be merged"
                )));
            }
            let tree = self.load_tree(&db_tx, realm_id).await?;
            if tree.children(source).next().is_some() {
                return Err(EngineError::PreconditionFailed(format!(
                    "account {source} still has child accounts"
                )));
            }
            for account_id in [source, target] {
                if bank_accounts::Entity::find_by_id((realm_id.to_string(), account_id.to_string()))
                    .one(&db_tx)
                    .await?
                    .is_some()
                {
                    return Err(EngineError::Validation(format!(
                        "bank account {account_id} cannot be merged"
                    )));
                }
            }

            let moved = booking_entries::Entity::update_many()
                .col_expr(booking_entries::Column::AccountId, Expr::value(target))
                .filter(booking_entries::Column::RealmId.eq(realm_id.to_string()))
                .filter(booking_entries::Column::AccountId.eq(source.to_string()))
                .exec(&db_tx)
                .await?
                .rows_affected;

            let matcher_rows = matchers::Entity::find()
                .filter(matchers::Column::RealmId.eq(realm_id.to_string()))
                .all(&db_tx)
                .await?;
            for row in matcher_rows {
                let mut matcher = UnbookedBankTransactionMatcher::try_from(row)?;
                if repoint_matcher(&mut matcher, source, target)? {
                    matchers::ActiveModel::try_from(&matcher)?
                        .update(&db_tx)
                        .await?;
                }
            }

            accounts::Entity::delete_by_id((realm_id.to_string(), source.to_string()))
                .exec(&db_tx)
                .await?;

            let payload = json!({ "source": source, "target": target });
            for event in [
                ChangeEventType::AccountsChanged,
                ChangeEventType::BookingsChanged,
                ChangeEventType::UnbookedTransactionMatchersChanged,
            ] {
                changes
                    .record(&db_tx, event, realm_id, payload.clone())
                    .await?;
            }
            info!(realm_id, source, target, moved, "account merged");
            Ok(())
        })
    }

    pub async fn get_accounts(&self, realm_id: &str, user_id: &str) -> ResultEngine<Vec<Account>> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            self.load_accounts(&db_tx, realm_id).await
        })
    }

    /// Balance of an account including every account below it.
    pub async fn account_balance(
        &self,
        realm_id: &str,
        account_id: &str,
        range: &DateRange,
        user_id: &str,
    ) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            self.require_access(&db_tx, realm_id, user_id, AccessLevel::Read)
                .await?;
            let tree = self.load_tree(&db_tx, realm_id).await?;
            if !tree.contains(account_id) {
                return Err(EngineError::NotFound(format!("account {account_id}")));
            }
            self.sum_entries(&db_tx, realm_id, &tree.subtree(account_id), range)
                .await
        })
    }
}

/// Replaces `source` with `target` in every account reference of a matcher.
/// Returns whether anything changed.
fn repoint_matcher(
    matcher: &mut UnbookedBankTransactionMatcher,
    source: &str,
    target: &str,
) -> ResultEngine<bool> {
    let mut changed = false;
    if matcher.action_account_id.as_deref() == Some(source) {
        matcher.action_account_id = Some(target.to_string());
        changed = true;
    }
    if let ActionExpr::AccountAction {
        main_account_id,
        additional_splits,
        ..
    } = &mut matcher.action
    {
        if main_account_id.as_str() == source {
            *main_account_id = target.to_string();
            changed = true;
        }
        if let Some(amount) = additional_splits.remove(source) {
            changed = true;
            if main_account_id.as_str() != target {
                let merged = additional_splits.entry(target.to_string()).or_default();
                *merged = merged.checked_add(amount).ok_or_else(|| {
                    EngineError::Validation(format!(
                        "splits of matcher {} overflow when merged into {target}",
                        matcher.id
                    ))
                })?;
            }
        }
        // A split on the main account is the same as no split.
        if additional_splits.remove(main_account_id.as_str()).is_some() {
            changed = true;
        }
    }
    Ok(changed)
}
