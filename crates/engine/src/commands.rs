//! Command structs for engine write operations.
//!
//! These types group parameters of the writes that take more than a handful
//! of arguments, keeping call sites readable.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{ActionExpr, BookingEntry, ControlAccountType, FilterExpr};

/// Insert a booking, or replace an existing one when `booking_id` is set.
#[derive(Clone, Debug)]
pub struct BookingCmd {
    pub realm_id: String,
    pub user_id: String,
    pub booking_id: Option<i64>,
    pub description: Option<String>,
    pub datetime: DateTime<Utc>,
    pub entries: Vec<BookingEntry>,
}

impl BookingCmd {
    #[must_use]
    pub fn new(
        realm_id: impl Into<String>,
        user_id: impl Into<String>,
        datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            realm_id: realm_id.into(),
            user_id: user_id.into(),
            booking_id: None,
            description: None,
            datetime,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn replace(mut self, booking_id: i64) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn entry(mut self, account_id: impl Into<String>, amount_in_cents: i64) -> Self {
        self.entries
            .push(BookingEntry::new(account_id, amount_in_cents));
        self
    }

    #[must_use]
    pub fn entries(mut self, entries: Vec<BookingEntry>) -> Self {
        self.entries = entries;
        self
    }
}

/// Create a user account, or replace the one with the same `account_id`.
#[derive(Clone, Debug)]
pub struct AccountCmd {
    pub realm_id: String,
    pub user_id: String,
    pub account_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub parent_account_id: String,
}

impl AccountCmd {
    #[must_use]
    pub fn new(
        realm_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        parent_account_id: impl Into<String>,
    ) -> Self {
        Self {
            realm_id: realm_id.into(),
            user_id: user_id.into(),
            account_id: None,
            name: name.into(),
            description: None,
            parent_account_id: parent_account_id.into(),
        }
    }

    #[must_use]
    pub fn id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Open a bank account together with its backing account.
#[derive(Clone, Debug)]
pub struct BankAccountCmd {
    pub realm_id: String,
    pub user_id: String,
    pub account_id: Option<String>,
    pub name: String,
    pub bank_id: String,
    pub account_number: Option<String>,
    pub open_date: NaiveDate,
    /// Credit cards and loans live below `BankAccountLiability`.
    pub liability: bool,
    pub opening_balance: i64,
}

impl BankAccountCmd {
    #[must_use]
    pub fn new(
        realm_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        bank_id: impl Into<String>,
        open_date: NaiveDate,
    ) -> Self {
        Self {
            realm_id: realm_id.into(),
            user_id: user_id.into(),
            account_id: None,
            name: name.into(),
            bank_id: bank_id.into(),
            account_number: None,
            open_date,
            liability: false,
            opening_balance: 0,
        }
    }

    #[must_use]
    pub fn id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    #[must_use]
    pub fn account_number(mut self, account_number: impl Into<String>) -> Self {
        self.account_number = Some(account_number.into());
        self
    }

    #[must_use]
    pub fn liability(mut self) -> Self {
        self.liability = true;
        self
    }

    #[must_use]
    pub fn opening_balance(mut self, amount_in_cents: i64) -> Self {
        self.opening_balance = amount_in_cents;
        self
    }
}

/// Record one bank transaction by hand.
#[derive(Clone, Debug)]
pub struct UnbookedTransactionCmd {
    pub realm_id: String,
    pub user_id: String,
    pub account_id: String,
    pub memo: Option<String>,
    pub datetime: DateTime<Utc>,
    pub amount_in_cents: i64,
    pub other_account_number: Option<String>,
}

impl UnbookedTransactionCmd {
    #[must_use]
    pub fn new(
        realm_id: impl Into<String>,
        user_id: impl Into<String>,
        account_id: impl Into<String>,
        amount_in_cents: i64,
        datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            realm_id: realm_id.into(),
            user_id: user_id.into(),
            account_id: account_id.into(),
            memo: None,
            datetime,
            amount_in_cents,
            other_account_number: None,
        }
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    #[must_use]
    pub fn other_account_number(mut self, number: impl Into<String>) -> Self {
        self.other_account_number = Some(number.into());
        self
    }
}

/// Create a matcher, or replace the one with the same `matcher_id`.
#[derive(Clone, Debug)]
pub struct MatcherCmd {
    pub realm_id: String,
    pub user_id: String,
    pub matcher_id: Option<String>,
    pub name: String,
    pub filter: FilterExpr,
    pub action: ActionExpr,
    pub action_account_id: Option<String>,
    pub action_memo: Option<String>,
}

impl MatcherCmd {
    #[must_use]
    pub fn new(
        realm_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        filter: FilterExpr,
        action: ActionExpr,
    ) -> Self {
        Self {
            realm_id: realm_id.into(),
            user_id: user_id.into(),
            matcher_id: None,
            name: name.into(),
            filter,
            action,
            action_account_id: None,
            action_memo: None,
        }
    }

    /// Matcher booking straight into `account_id`.
    #[must_use]
    pub fn transfer(
        realm_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        filter: FilterExpr,
        account_id: impl Into<String>,
    ) -> Self {
        Self::new(realm_id, user_id, name, filter, ActionExpr::Transfer)
            .action_account(account_id)
    }

    /// Matcher booking through a control account into `main_account_id`.
    #[must_use]
    pub fn account_action(
        realm_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        filter: FilterExpr,
        control: ControlAccountType,
        main_account_id: impl Into<String>,
    ) -> Self {
        let action = ActionExpr::AccountAction {
            control,
            main_account_id: main_account_id.into(),
            additional_splits: BTreeMap::new(),
        };
        Self::new(realm_id, user_id, name, filter, action)
    }

    #[must_use]
    pub fn id(mut self, matcher_id: impl Into<String>) -> Self {
        self.matcher_id = Some(matcher_id.into());
        self
    }

    #[must_use]
    pub fn action_account(mut self, account_id: impl Into<String>) -> Self {
        self.action_account_id = Some(account_id.into());
        self
    }

    #[must_use]
    pub fn action_memo(mut self, memo: impl Into<String>) -> Self {
        self.action_memo = Some(memo.into());
        self
    }

    /// Adds a split to an `AccountAction`; ignored for transfers.
    #[must_use]
    pub fn split(mut self, account_id: impl Into<String>, amount_in_cents: i64) -> Self {
        if let ActionExpr::AccountAction {
            additional_splits, ..
        } = &mut self.action
        {
            additional_splits.insert(account_id.into(), amount_in_cents);
        }
        self
    }
}
