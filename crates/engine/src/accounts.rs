//! Chart of accounts.
//!
//! Every realm owns a tree of [`Account`]s. The roots are always
//! [`StandardAccount`]s, seeded when the realm is created and referenced by
//! the rest of the engine through their fixed ids. User accounts hang below
//! them, and the root an account descends from decides its [`AccountKind`].

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// System-defined accounts present in every realm.
///
/// The id of a standard account in the `accounts` table is its
/// [`as_str`](StandardAccount::as_str) value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardAccount {
    Asset,
    Liability,
    Income,
    Expense,
    Equity,
    Parties,
    AccountReceivable,
    BankAccountAsset,
    OtherBankTransfers,
    AccountPayable,
    BankAccountLiability,
    OpeningBalances,
}

/// `(account, parent)` for every standard account, parents first.
pub const STANDARD_ACCOUNTS: [(StandardAccount, Option<StandardAccount>); 12] = [
    (StandardAccount::Asset, None),
    (StandardAccount::Liability, None),
    (StandardAccount::Income, None),
    (StandardAccount::Expense, None),
    (StandardAccount::Equity, None),
    (StandardAccount::Parties, None),
    (StandardAccount::AccountReceivable, Some(StandardAccount::Asset)),
    (StandardAccount::BankAccountAsset, Some(StandardAccount::Asset)),
    (StandardAccount::OtherBankTransfers, Some(StandardAccount::Asset)),
    (StandardAccount::AccountPayable, Some(StandardAccount::Liability)),
    (StandardAccount::BankAccountLiability, Some(StandardAccount::Liability)),
    (StandardAccount::OpeningBalances, Some(StandardAccount::Equity)),
];

impl StandardAccount {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "Asset",
            Self::Liability => "Liability",
            Self::Income => "Income",
            Self::Expense => "Expense",
            Self::Equity => "Equity",
            Self::Parties => "Parties",
            Self::AccountReceivable => "AccountReceivable",
            Self::BankAccountAsset => "BankAccountAsset",
            Self::OtherBankTransfers => "OtherBankTransfers",
            Self::AccountPayable => "AccountPayable",
            Self::BankAccountLiability => "BankAccountLiability",
            Self::OpeningBalances => "OpeningBalances",
        }
    }

    /// Human readable name used when seeding a realm.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Asset => "Assets",
            Self::Liability => "Liabilities",
            Self::Income => "Income",
            Self::Expense => "Expenses",
            Self::Equity => "Equity",
            Self::Parties => "Parties",
            Self::AccountReceivable => "Accounts receivable",
            Self::BankAccountAsset => "Bank accounts",
            Self::OtherBankTransfers => "Other bank transfers",
            Self::AccountPayable => "Accounts payable",
            Self::BankAccountLiability => "Credit cards and loans",
            Self::OpeningBalances => "Opening balances",
        }
    }

    pub fn parent(self) -> Option<StandardAccount> {
        STANDARD_ACCOUNTS
            .iter()
            .find(|(account, _)| *account == self)
            .and_then(|(_, parent)| *parent)
    }

    /// Classification carried by a root account.
    ///
    /// Only meaningful on roots; for non-roots it returns the kind of the
    /// standard root they hang below.
    pub fn kind(self) -> AccountKind {
        match self.parent() {
            Some(parent) => parent.kind(),
            None => match self {
                Self::Income | Self::Expense => AccountKind::IncomeOrExpense,
                Self::Parties => AccountKind::Party,
                _ => AccountKind::AssetOrLiability,
            },
        }
    }
}

impl TryFrom<&str> for StandardAccount {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        STANDARD_ACCOUNTS
            .iter()
            .map(|(account, _)| *account)
            .find(|account| account.as_str() == value)
            .ok_or_else(|| EngineError::NotFound(format!("standard account {value}")))
    }
}

/// Booking semantics of an account, decided by its root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountKind {
    AssetOrLiability,
    IncomeOrExpense,
    Party,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub realm_id: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_account_id: Option<String>,
    pub is_standard: bool,
}

impl Account {
    pub fn standard(realm_id: &str, account: StandardAccount) -> Self {
        Self {
            id: account.as_str().to_string(),
            realm_id: realm_id.to_string(),
            name: account.display_name().to_string(),
            description: None,
            parent_account_id: account.parent().map(|p| p.as_str().to_string()),
            is_standard: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub realm_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_account_id: Option<String>,
    pub is_standard: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            realm_id: ActiveValue::Set(account.realm_id.clone()),
            id: ActiveValue::Set(account.id.clone()),
            name: ActiveValue::Set(account.name.clone()),
            description: ActiveValue::Set(account.description.clone()),
            parent_account_id: ActiveValue::Set(account.parent_account_id.clone()),
            is_standard: ActiveValue::Set(account.is_standard),
        }
    }
}

impl From<Model> for Account {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            realm_id: model.realm_id,
            name: model.name,
            description: model.description,
            parent_account_id: model.parent_account_id,
            is_standard: model.is_standard,
        }
    }
}
