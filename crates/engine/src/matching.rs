//! Filter and action expressions of unbooked transaction matchers.
//!
//! Both are closed sum types serialized with an explicit `type`
//! discriminant. Evaluation is pure: the same filter and transaction always
//! give the same answer, and nothing here touches the database.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::{BookingEntry, EngineError, ResultEngine, UnbookedTransaction, bookings::negated};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FilterExpr {
    Contains { value: String },
    StartsWith { value: String },
    EndsWith { value: String },
    /// `from` inclusive, `to` exclusive.
    AmountBetween { from: i64, to: i64 },
    And { filters: Vec<FilterExpr> },
    Or { filters: Vec<FilterExpr> },
}

fn fold_text(value: &str) -> String {
    value.nfkc().collect::<String>().to_lowercase()
}

impl FilterExpr {
    pub fn contains(value: impl Into<String>) -> Self {
        Self::Contains {
            value: value.into(),
        }
    }

    /// Memo comparisons ignore case and Unicode compatibility differences.
    /// A missing memo compares as the empty string.
    pub fn matches(&self, tx: &UnbookedTransaction) -> bool {
        let memo = || fold_text(tx.memo.as_deref().unwrap_or_default());
        match self {
            Self::Contains { value } => memo().contains(&fold_text(value)),
            Self::StartsWith { value } => memo().starts_with(&fold_text(value)),
            Self::EndsWith { value } => memo().ends_with(&fold_text(value)),
            Self::AmountBetween { from, to } => {
                *from <= tx.amount_in_cents && tx.amount_in_cents < *to
            }
            Self::And { filters } => filters.iter().all(|f| f.matches(tx)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(tx)),
        }
    }

    pub fn validate(&self) -> ResultEngine<()> {
        match self {
            Self::Contains { value } | Self::StartsWith { value } | Self::EndsWith { value } => {
                if value.trim().is_empty() {
                    return Err(EngineError::Validation(
                        "text filter must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
            Self::AmountBetween { from, to } => {
                if from >= to {
                    return Err(EngineError::Validation(format!(
                        "invalid amount range: {from} must be < {to}"
                    )));
                }
                Ok(())
            }
            Self::And { filters } | Self::Or { filters } => {
                filters.iter().try_for_each(FilterExpr::validate)
            }
        }
    }
}

/// Which intermediary control account an [`ActionExpr::AccountAction`] books
/// through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlAccountType {
    Payable,
    Receivable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionExpr {
    /// Books the transaction straight against the matcher's action account.
    Transfer,
    /// Books the transaction against a payable/receivable control account,
    /// then categorizes the control account into `main_account_id` and the
    /// `additional_splits`.
    AccountAction {
        control: ControlAccountType,
        main_account_id: String,
        /// Positive magnitudes, booked in the same direction as the main
        /// entry; the main entry receives the remainder.
        #[serde(default)]
        additional_splits: BTreeMap<String, i64>,
    },
}

impl ActionExpr {
    pub fn validate(&self) -> ResultEngine<()> {
        let Self::AccountAction {
            main_account_id,
            additional_splits,
            ..
        } = self
        else {
            return Ok(());
        };
        if main_account_id.trim().is_empty() {
            return Err(EngineError::Validation(
                "mainAccountId must not be empty".to_string(),
            ));
        }
        for (account_id, amount) in additional_splits {
            if *amount <= 0 {
                return Err(EngineError::Validation(format!(
                    "split for {account_id} must be > 0"
                )));
            }
            if account_id == main_account_id {
                return Err(EngineError::Validation(format!(
                    "split account {account_id} duplicates the main account"
                )));
            }
        }
        Ok(())
    }
}

/// Entries booking `tx` straight against `counter_account`.
pub(crate) fn transfer_entries(
    tx: &UnbookedTransaction,
    counter_account: &str,
) -> ResultEngine<Vec<BookingEntry>> {
    Ok(vec![
        BookingEntry::new(tx.account_id.clone(), tx.amount_in_cents),
        BookingEntry::new(counter_account, negated(tx.amount_in_cents)?),
    ])
}

/// Entries moving the full amount out of `control_account` into the main
/// account and splits.
///
/// Fails if the splits exceed the transaction amount; a zero remainder
/// drops the main entry.
pub(crate) fn categorize_entries(
    tx: &UnbookedTransaction,
    control_account: &str,
    main_account_id: &str,
    additional_splits: &BTreeMap<String, i64>,
) -> ResultEngine<Vec<BookingEntry>> {
    let overflow = || EngineError::Validation("split amounts overflow".to_string());
    let total = negated(tx.amount_in_cents)?;
    let direction: i64 = if total < 0 { -1 } else { 1 };

    let mut entries = vec![BookingEntry::new(control_account, tx.amount_in_cents)];
    let mut remainder = total;
    for (account_id, magnitude) in additional_splits {
        let amount = magnitude.checked_mul(direction).ok_or_else(overflow)?;
        remainder = remainder.checked_sub(amount).ok_or_else(overflow)?;
        entries.push(BookingEntry::new(account_id.clone(), amount));
    }

    if remainder != 0 && remainder.signum() != direction {
        return Err(EngineError::Validation(format!(
            "splits exceed the transaction amount of {}",
            tx.amount_in_cents.abs()
        )));
    }
    if remainder == 0 && additional_splits.is_empty() {
        return Err(EngineError::Validation(
            "cannot categorize a zero amount transaction".to_string(),
        ));
    }
    if remainder != 0 {
        entries.insert(1, BookingEntry::new(main_account_id, remainder));
    }
    Ok(entries)
}
