//! Ledger & reconciliation engine.
//!
//! Double-entry bookkeeping per realm: a chart of accounts, zero-sum
//! bookings, imported bank transactions waiting to be booked, and matchers
//! that turn those transactions into bookings. Every write runs in one
//! database transaction, records its changes in the changelog and, after
//! commit, refreshes the live subscriptions it affects.

pub use access::AccessLevel;
pub use account_tree::AccountTree;
pub use accounts::{Account, AccountKind, STANDARD_ACCOUNTS, StandardAccount};
pub use bank_accounts::BankAccount;
pub use bookings::{Booking, BookingEntry, validate_entries};
pub use changelog::{ChangeEvent, ChangeEventType, ChangeSet};
pub use commands::{
    AccountCmd, BankAccountCmd, BookingCmd, MatcherCmd, UnbookedTransactionCmd,
};
pub use currency::Currency;
pub use error::EngineError;
pub use import::{DuplicatePolicy, DuplicatePredicate, ImportRecord, ImportReport, read_csv};
pub use matchers::UnbookedBankTransactionMatcher;
pub use matching::{ActionExpr, ControlAccountType, FilterExpr};
pub use money::MoneyCents;
pub use notify::{Notifier, Push, Subscription};
pub use ops::{Engine, EngineBuilder};
pub use queries::{BankAccountTransaction, BookingFilter, DateRange, ReadRequest, ReadResponse};
pub use realms::{Realm, RealmView};
pub use unbooked_transactions::UnbookedTransaction;

mod access;
mod account_tree;
mod accounts;
mod bank_accounts;
mod booking_entries;
mod bookings;
mod changelog;
mod commands;
mod currency;
mod error;
mod import;
mod locks;
mod matchers;
mod matching;
mod money;
mod notify;
mod ops;
mod queries;
mod realm_access;
mod realm_cache;
mod realms;
mod unbooked_transactions;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
